//! Mongo Datastore - connection bootstrap for MongoDB
//!
//! Connects, publishes the default datastore, and holds the connection
//! open until Ctrl-C.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mongo_datastore::{config::Args, StoreController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("======================================");
    info!("  Mongo Datastore");
    info!("======================================");
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });

    let mut controller = StoreController::new(args);
    if !controller.is_enabled() {
        info!("Datastore plugin disabled, nothing to do");
        return Ok(());
    }

    if let Err(e) = controller.start().await {
        error!("Datastore startup failed: {}", e);
        std::process::exit(1);
    }

    let store = controller.store()?;
    info!("Default datastore: {}", store.default_datastore().name());
    info!("Uploads bucket: {}", store.uploads_collection());
    info!("======================================");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    drop(store);
    controller.stop().await;

    Ok(())
}

/// Filter used when `RUST_LOG` is unset
fn default_filter(log_level: &str) -> EnvFilter {
    EnvFilter::new(format!("mongo_datastore={},info", log_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_crate() {
        let filter = default_filter("debug").to_string();
        assert!(filter.contains("mongo_datastore=debug"));
        assert!(filter.contains("info"));
    }

    #[test]
    fn test_plain_fmt_layer_accepts_events() {
        let subscriber = tracing_subscriber::registry()
            .with(default_filter("trace"))
            .with(tracing_subscriber::fmt::layer().with_test_writer());
        tracing::subscriber::with_default(subscriber, || {
            info!(db = "app", "Datastore started");
        });
    }
}
