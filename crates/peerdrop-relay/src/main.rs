use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use peerdrop_relay::{serve, spawn_reaper, SessionStore, REAP_INTERVAL};

#[derive(Parser)]
#[command(name = "peerdrop-relay", version, about = "Signaling relay for peerdrop file transfers")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Seconds a session may wait for a receiver before it is reaped.
    #[arg(long, default_value_t = 300)]
    session_ttl: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peerdrop_relay=info".into()),
        )
        .init();

    let args = Args::parse();
    let store = SessionStore::new();

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind {addr}");
            std::process::exit(1);
        }
    };

    tracing::info!("peerdrop-relay listening on {}", addr);

    spawn_reaper(
        store.clone(),
        Duration::from_secs(args.session_ttl),
        REAP_INTERVAL,
    );

    serve(listener, store).await;
}
