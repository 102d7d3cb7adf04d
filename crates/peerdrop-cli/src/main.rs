mod cli;
mod config_cmd;
mod output;
mod receive;
mod send;
mod settings;
mod storage;

use peerdrop_config::PeerdropConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

/// Load the config file, falling back to defaults. The warning is returned
/// rather than logged because logging is not set up yet.
fn load_config(args: &Args) -> (PeerdropConfig, Option<String>) {
    let loaded = match &args.config {
        Some(path) => peerdrop_config::load_config_from(path),
        None => peerdrop_config::load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (
            PeerdropConfig::default(),
            Some(format!("Config load failed, using defaults: {e}")),
        ),
    }
}

fn init_tracing(override_directive: Option<&str>, config: &PeerdropConfig) {
    let fallback = config.logging.level.directive();
    let directive = override_directive.unwrap_or(fallback);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse()
                    .or_else(|_| fallback.parse())
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let args = cli::parse();
    let (config, warning) = load_config(&args);
    init_tracing(args.log_level.as_deref(), &config);

    tracing::debug!("peerdrop v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Using config override");
    }
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }

    let relay_url = args.relay_url.as_deref();
    let result = match args.command {
        Command::Send { file, qr } => {
            send::run(
                settings::client_config(&config, relay_url),
                settings::transport_factory(&config),
                file,
                qr,
            )
            .await
        }
        Command::Receive { code, yes, out } => {
            receive::run(
                settings::client_config(&config, relay_url),
                settings::transport_factory(&config),
                &code,
                yes,
                storage::receive_dir(out, &config.transfer.receive_dir),
            )
            .await
        }
        Command::Config { action } => config_cmd::run(action, args.config.as_deref(), &config),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Exiting with error");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
