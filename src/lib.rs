pub mod config;
pub mod monitor;
pub mod notify;
pub mod reading;
pub mod scheduler;
pub mod source;
pub mod telegram;

#[cfg(test)]
mod testing;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,risk_watch=info,chat_id=info";

/// Install the fmt subscriber shared by both binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
}
