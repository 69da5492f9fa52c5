// src/lib.rs
pub mod ports {
    pub mod scripted_exchange;
}
pub mod trade {
    pub mod execution {
        pub mod exchange_client_box;
        pub mod order_poller;
    }
}
pub mod abort_guard;
pub mod config;
pub mod email_client;
pub mod exchange;
pub mod logging;
pub mod notifier;
pub mod pairtrade;
pub mod rate_limit_notifier;

#[cfg(test)]
mod testutil;
