//! Listener lifecycle: bind, serve until shutdown, reload on SIGHUP.

use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::http::router;
use crate::service::PolicyService;
use crate::RuntimeError;

/// Serve `service` on `addr` until `shutdown` resolves.
pub async fn serve<F>(service: PolicyService, addr: SocketAddr, shutdown: F) -> Result<(), RuntimeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_listener(service, listener, shutdown).await
}

/// Serve on an already bound listener.
pub async fn serve_listener<F>(
    service: PolicyService,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), RuntimeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    tracing::info!(
        addr = %local,
        mode = %service.mode(),
        genome_sha256 = %service.genome().content_hash(),
        "Antigone listening"
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Antigone shut down");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the error is logged and that signal
/// is never observed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

/// Reload the genome at `path` every time the process receives SIGHUP.
///
/// A genome that fails to load is logged and the active one keeps serving.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    service: PolicyService,
    path: std::path::PathBuf,
) -> Result<tokio::task::JoinHandle<()>, RuntimeError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match service.reload_from_path(&path) {
                Ok(summary) => tracing::info!(
                    path = %path.display(),
                    genome_sha256 = %summary.genome_sha256,
                    "Genome reloaded"
                ),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Genome reload failed, keeping active genome"
                ),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEmitter;
    use crate::config::DecisionMode;
    use antigone_core::Genome;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let service = PolicyService::new(
            Genome::from_yaml("axioms: []").unwrap(),
            DecisionMode::Warn,
            AuditEmitter::disabled(),
        )
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve_listener(service, listener, async {
            let _ = rx.await;
        }));

        let body = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        assert_eq!(body["ready"], true);
        assert_eq!(body["rules"], 0);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
