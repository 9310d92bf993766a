use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Resolve on the first termination signal (SIGTERM / SIGINT, Ctrl+C on Windows).
pub async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("shutdown: SIGTERM"),
            _ = sigint.recv()  => tracing::info!("shutdown: SIGINT"),
        }
        Ok(())
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown: Ctrl+C");
        Ok(())
    }
}

/// Cancel `token` once a termination signal arrives.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown().await {
            tracing::warn!(error = %e, "signal handler failed; cancelling");
        }
        token.cancel();
    });
}
