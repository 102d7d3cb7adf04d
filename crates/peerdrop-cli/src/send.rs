//! `peerdrop send`: offer a file and stream it once the receiver accepts.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use peerdrop_common::{PeerdropError, Result};
use peerdrop_core::{
    ClientConfig, PairingState, PeerdropClient, SessionEvent, TcpTransportFactory,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::output::{progress_line, render_qr_unicode};

/// How long to wait for the receiver to hang up after the last byte.
const CLOSE_GRACE: Duration = Duration::from_secs(10);

pub async fn run(
    config: ClientConfig,
    transport: TcpTransportFactory,
    file: PathBuf,
    qr: bool,
) -> Result<()> {
    if !file.is_file() {
        return Err(PeerdropError::Other(format!(
            "{} is not a readable file",
            file.display()
        )));
    }

    eprintln!("Connecting to relay at {}...", config.relay.url);
    let (client, mut events) = PeerdropClient::start(config, transport);
    let outcome = drive(&client, &mut events, &file, qr).await;
    client.shutdown().await;
    outcome
}

async fn drive(
    client: &PeerdropClient,
    events: &mut mpsc::Receiver<SessionEvent>,
    file: &Path,
    qr: bool,
) -> Result<()> {
    let mut offered = false;
    let mut has_code = false;

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
            SessionEvent::RelayConnected if !offered => {
                client.send_file(file).await;
                offered = true;
            }
            SessionEvent::RelayConnected => eprintln!("Reconnected to relay."),
            SessionEvent::RelayDisconnected => eprintln!("Lost the relay, retrying..."),
            SessionEvent::CodeAssigned(code) => {
                has_code = true;
                println!();
                println!("  Code: {code}");
                if qr {
                    match render_qr_unicode(code.as_str()) {
                        Some(block) => println!("\n{block}"),
                        None => eprintln!("Could not render a QR code."),
                    }
                }
                println!();
                println!("Waiting for the receiver...");
            }
            SessionEvent::PeerJoined => println!("Receiver joined; waiting for them to accept..."),
            SessionEvent::StateChanged(PairingState::Connecting) => println!("Connecting..."),
            SessionEvent::Progress(progress) => {
                print!("\r{}", progress_line(&progress));
                let _ = std::io::stdout().flush();
            }
            SessionEvent::SendComplete => {
                println!();
                wait_for_hangup(events).await;
                info!(file = %file.display(), "Transfer finished");
                println!("Sent {}.", file.display());
                return Ok(());
            }
            SessionEvent::Warning(warning) => {
                eprintln!("warning: {warning}");
                // Before a code exists there is no session left to wait on.
                if !has_code {
                    return Err(PeerdropError::Other(warning));
                }
            }
            SessionEvent::Closed(reason) => {
                println!();
                return Err(PeerdropError::Other(reason.user_message()));
            }
            _ => {}
        }
    }
}

/// Let the receiver acknowledge by closing; give up after [`CLOSE_GRACE`].
async fn wait_for_hangup(events: &mut mpsc::Receiver<SessionEvent>) {
    let deadline = tokio::time::sleep(CLOSE_GRACE);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("Receiver did not close in time");
                return;
            }
            event = events.recv() => match event {
                Some(SessionEvent::Closed(_)) | None => return,
                Some(_) => {}
            },
        }
    }
}
