use tokio::{
    select,
    signal::unix::{signal, SignalKind},
};
use tracing::info;

// Functions

/// Resolves when the process receives SIGINT or SIGTERM and returns the signal name.
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let name = select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    info!(signal = name, "shutdown requested");
    Ok(name)
}
