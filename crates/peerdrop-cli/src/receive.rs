//! `peerdrop receive`: join a session, accept the offer, save the file.

use std::io::Write;
use std::path::{Path, PathBuf};

use peerdrop_common::{FileMetadata, PeerdropError, Result, SessionCode};
use peerdrop_core::{
    ClientConfig, CloseReason, PairingState, PeerdropClient, SessionEvent, TcpTransportFactory,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::output::{format_size, progress_line};
use crate::storage;

pub async fn run(
    config: ClientConfig,
    transport: TcpTransportFactory,
    code: &str,
    auto_accept: bool,
    out_dir: PathBuf,
) -> Result<()> {
    let code = SessionCode::parse(code)?;

    eprintln!("Connecting to relay at {}...", config.relay.url);
    let (client, mut events) = PeerdropClient::start(config, transport);
    let outcome = drive(&client, &mut events, &code, auto_accept, &out_dir).await;
    client.shutdown().await;
    outcome
}

async fn drive(
    client: &PeerdropClient,
    events: &mut mpsc::Receiver<SessionEvent>,
    code: &SessionCode,
    auto_accept: bool,
    out_dir: &Path,
) -> Result<()> {
    let mut joined = false;
    let mut saved: Option<PathBuf> = None;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                client.close().await;
                return Err(PeerdropError::Other("interrupted".into()));
            }
        };
        let Some(event) = event else {
            return Err(PeerdropError::Other("client stopped unexpectedly".into()));
        };

        match event {
            SessionEvent::RelayConnected if !joined => {
                client.join(code.as_str()).await;
                joined = true;
            }
            SessionEvent::RelayConnected => eprintln!("Reconnected to relay."),
            SessionEvent::RelayDisconnected => eprintln!("Lost the relay, retrying..."),
            SessionEvent::Offered(meta) => {
                describe_offer(&meta);
                if auto_accept || confirm().await? {
                    client.accept().await;
                } else {
                    client.decline().await;
                }
            }
            SessionEvent::StateChanged(PairingState::Connecting) => println!("Connecting..."),
            SessionEvent::Progress(progress) => {
                print!("\r{}", progress_line(&progress));
                let _ = std::io::stdout().flush();
            }
            SessionEvent::FileReceived(file) => {
                println!();
                let path = storage::save(out_dir, &file).await?;
                info!(path = %path.display(), bytes = file.data.len(), "File saved");
                println!("Saved {}.", path.display());
                saved = Some(path);
                client.close().await;
            }
            SessionEvent::Warning(warning) => eprintln!("warning: {warning}"),
            SessionEvent::Closed(reason) => {
                return match (saved, reason) {
                    (Some(_), _) => Ok(()),
                    (None, CloseReason::Declined) => {
                        println!("Declined.");
                        Ok(())
                    }
                    (None, reason) => {
                        println!();
                        Err(PeerdropError::Other(reason.user_message()))
                    }
                };
            }
            _ => {}
        }
    }
}

fn describe_offer(meta: &FileMetadata) {
    println!();
    println!("  Incoming file: {}", meta.name);
    println!("  Size:          {}", format_size(meta.size));
    if !meta.mime_type.is_empty() {
        println!("  Type:          {}", meta.mime_type);
    }
    println!();
}

/// Ask on stdin. Anything but `y`/`yes` declines.
async fn confirm() -> Result<bool> {
    print!("Accept? [y/N] ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
