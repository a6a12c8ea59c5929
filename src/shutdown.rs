use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Returns a token cancelled on the first SIGTERM or SIGINT.
///
/// The driver loop, event forwarder and API server all watch this token;
/// the driver runs one last flush after it fires so accepted requests are
/// not silently lost.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers, falling back to Ctrl-C");
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, draining matchmaking engine");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, draining matchmaking engine");
            }
        }

        trigger.cancel();
    });

    token
}
