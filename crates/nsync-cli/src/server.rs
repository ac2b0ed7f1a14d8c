//! REST endpoint in front of the kernel facade.
//!
//! Every handler only marshals a request into a facade call; results come
//! back through the bus as correlated signals.

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nsync_kernel::{DaemonConfig, Kernel, KernelError, KernelFacade};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::api::{AddFolderRequest, ErrorResponse, FolderResponse, StatusResponse};

/// Boot the kernel and serve the REST API until the daemon is stopped.
pub async fn run(config: DaemonConfig, port: u16) -> anyhow::Result<()> {
    let kernel = Kernel::boot(config).await.context("failed to boot kernel")?;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(kernel, listener).await
}

/// Serve on an already bound listener, then shut the kernel down.
pub async fn serve(kernel: Kernel, listener: TcpListener) -> anyhow::Result<()> {
    let facade = kernel.facade();
    info!(addr = %listener.local_addr()?, "REST server listening");

    let result = axum::serve(listener, router(facade.clone()))
        .with_graceful_shutdown(shutdown_signal(facade))
        .await;

    kernel.shutdown();
    info!("REST server stopped");
    result.context("REST server failed")
}

pub fn router(facade: KernelFacade) -> Router {
    Router::new()
        .route("/admin/status", get(status))
        .route("/admin/shutdown", post(shutdown))
        .route("/rest/folders", post(add_folder).get(list_folders))
        .with_state(facade)
}

async fn shutdown_signal(facade: KernelFacade) {
    tokio::select! {
        _ = facade.join() => info!("kernel stopped"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("interrupt received");
                if let Err(e) = facade.stop() {
                    warn!(error = %e, "stop signal not delivered");
                }
            }
            Err(e) => {
                error!(error = %e, "cannot listen for interrupts");
                facade.join().await;
            }
        },
    }
}

fn uptime(facade: &KernelFacade) -> StatusResponse {
    StatusResponse {
        uptime_mins: facade.uptime().as_secs() / 60,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn status(State(facade): State<KernelFacade>) -> Json<StatusResponse> {
    info!("status request");
    Json(uptime(&facade))
}

async fn shutdown(State(facade): State<KernelFacade>) -> Result<Json<StatusResponse>, ApiError> {
    info!("shutdown request");
    facade.stop()?;
    Ok(Json(uptime(&facade)))
}

async fn add_folder(
    State(facade): State<KernelFacade>,
    Json(request): Json<AddFolderRequest>,
) -> Result<Json<FolderResponse>, ApiError> {
    info!(local = %request.local_uri, remote = %request.remote_uri, "add folder request");
    let folder = facade
        .add_folder(&request.local_uri, &request.remote_uri)
        .await?;
    Ok(Json(FolderResponse::from(&folder)))
}

async fn list_folders(State(facade): State<KernelFacade>) -> Json<Vec<FolderResponse>> {
    let folders = facade.folders().await;
    Json(folders.iter().map(FolderResponse::from).collect())
}

/// A kernel error rendered as an HTTP response.
struct ApiError(KernelError);

impl From<KernelError> for ApiError {
    fn from(e: KernelError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KernelError::Rejected(_) => StatusCode::BAD_REQUEST,
            KernelError::NoResponse(_) => StatusCode::GATEWAY_TIMEOUT,
            KernelError::Bus(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self.0 {
            KernelError::Rejected(reason) => reason,
            other => other.to_string(),
        };
        warn!(status = status.as_u16(), %message, "request failed");
        (status, Json(ErrorResponse { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::error::ClientError;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn start(dir: &TempDir) -> (u16, tokio::task::JoinHandle<anyhow::Result<()>>) {
        let config = DaemonConfig::with_config_dir(dir.path().join("config"));
        let kernel = Kernel::boot(config).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (port, tokio::spawn(serve(kernel, listener)))
    }

    fn uri(dir: &TempDir, name: &str) -> String {
        format!("file://{}", dir.path().join(name).display())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_folder_endpoints() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        let (port, server) = start(&dir).await;
        let client = Client::new(port).unwrap();

        assert_eq!(client.status().await.unwrap().uptime_mins, 0);

        let created = client
            .add_folder(&uri(&dir, "a"), &uri(&dir, "b"))
            .await
            .unwrap();
        assert!(!created.uid.is_empty());
        assert_eq!(created.remote_uri, uri(&dir, "b"));

        match client.add_folder(&uri(&dir, "c"), &uri(&dir, "b")).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("already registered"), "{}", message);
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        assert_eq!(client.folders().await.unwrap(), vec![created]);

        client.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_invalid_uri_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (port, server) = start(&dir).await;
        let client = Client::new(port).unwrap();

        match client.add_folder("not a uri", &uri(&dir, "b")).await {
            Err(ClientError::Api { status, .. }) => assert_eq!(status, 400),
            other => panic!("expected rejection, got {:?}", other),
        }

        client.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_error_status_codes() {
        let rejected = ApiError(KernelError::Rejected("dup".into())).into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let timeout = ApiError(KernelError::NoResponse(500)).into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
