//! Signal handling for graceful shutdown

use tokio::sync::watch;

/// Forward SIGINT/SIGTERM to the provider loop
///
/// The first signal requests a graceful stop after the current batch. A
/// second one exits the process immediately.
pub async fn watch_signals(shutdown: watch::Sender<bool>) {
    loop {
        let received = wait_for_signal().await;

        if *shutdown.borrow() {
            log::warn!("Shutdown now!");
            std::process::exit(1);
        }

        log::info!("Received {}, stopping...", received);
        if shutdown.send(true).is_err() {
            // Provider loop already gone
            return;
        }
    }
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
