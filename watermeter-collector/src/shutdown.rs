use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Cancel `token` on SIGINT (Ctrl+C) or, on unix, SIGTERM.
///
/// The SIGTERM listener is registered before this returns, so a signal sent
/// right after the call is not missed.
pub fn install(token: CancellationToken) {
    let terminate = terminate_signal();
    tokio::spawn(cancel_on(wait_for_signal(terminate), token));
}

/// Wait for `signal`, then cancel `token`.
pub async fn cancel_on<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = ()>,
{
    signal.await;
    token.cancel();
}

async fn wait_for_signal(terminate: impl Future<Output = ()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(unix)]
fn terminate_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let stream = signal(SignalKind::terminate());
    async move {
        match stream {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
fn terminate_signal() -> impl Future<Output = ()> {
    std::future::pending::<()>()
}
