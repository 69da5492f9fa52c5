use std::sync::Arc;

use crate::notifier::{Notifier, NOTIFY_TIMEOUT};

/// Tells the operator when the exchange starts answering with HTTP 429.
pub struct RateLimitNotifier {
    token_name: String,
    notifier: Arc<dyn Notifier + Send + Sync>,
}

impl RateLimitNotifier {
    pub fn new(token_name: &str, notifier: Arc<dyn Notifier + Send + Sync>) -> Self {
        Self {
            token_name: token_name.to_string(),
            notifier,
        }
    }

    pub async fn notify(&self, context: &str, detail: &str) {
        let subject = if self.token_name.is_empty() {
            format!("[RateLimit] {}", context)
        } else {
            format!("[{}] Rate limit - {}", self.token_name, context)
        };
        let body = format!(
            "{}\nHTTP 429 Too Many Requests detected while {}.\nDetail: {}",
            subject, context, detail
        );

        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(&body)).await {
            Ok(Ok(())) => log::warn!(
                "[RateLimit] notification sent for '{}' (detail: {})",
                context,
                detail
            ),
            Ok(Err(e)) => log::error!("[RateLimit] notification for '{}' failed: {}", context, e),
            Err(_) => log::error!("[RateLimit] notification for '{}' timed out", context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::HangingNotifier;

    #[tokio::test(start_paused = true)]
    async fn stalled_notifier_does_not_block_caller() {
        let notifier = RateLimitNotifier::new("ETH-BTC", Arc::new(HangingNotifier));
        let start = tokio::time::Instant::now();

        notifier.notify("get_order_status", "HTTP 429").await;

        assert_eq!(start.elapsed(), NOTIFY_TIMEOUT);
    }
}
