use pairleg::abort_guard::AbortGuard;
use pairleg::config::ExecutorConfig;
use pairleg::notifier::build_notifier;
use pairleg::pairtrade::{PairTradeExecutor, PairTradeRequest};
use pairleg::trade::execution::exchange_client_box::ExchangeClientBox;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ExecutorConfig::from_env_or_yaml()?;
    pairleg::logging::init(&cfg.log)?;

    log::info!("pairleg {}", env!("CARGO_PKG_VERSION"));

    let notifier = build_notifier(&cfg.notifier)?;
    let exchange = ExchangeClientBox::create(&cfg, notifier.clone())?;
    let executor = PairTradeExecutor::new(
        Arc::new(exchange),
        cfg.poll.clone(),
        AbortGuard::new(notifier),
    );

    let (mut trade, prices) = PairTradeRequest::from_yaml_path(&cfg.pair_trade_file)?.into_parts();
    log::info!(
        "Opening pair {} hedge_ratio={} z_score={} half_life={}",
        trade.pair_label(),
        trade.hedge_ratio,
        trade.z_score,
        trade.half_life
    );

    let status = executor.open_trades(&mut trade, &prices).await;
    log::info!(
        "Pair {} finished status={} comments='{}'",
        trade.pair_label(),
        status,
        trade.comments
    );
    log::info!("{}", serde_json::to_string(&trade)?);
    Ok(())
}
