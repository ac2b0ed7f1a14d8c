//! HTTP client for the daemon's REST endpoint.

use std::time::Duration;

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{AddFolderRequest, ErrorResponse, FolderResponse, StatusResponse};
use crate::error::{ClientError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Client {
    base: String,
    http: reqwest::Client,
}

impl Client {
    /// Client for a daemon listening on `127.0.0.1:<port>`.
    pub fn new(port: u16) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base: format!("http://127.0.0.1:{}", port),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let resp = self.http.get(self.url("/admin/status")).send().await?;
        decode(resp).await
    }

    pub async fn shutdown(&self) -> Result<StatusResponse> {
        let resp = self.http.post(self.url("/admin/shutdown")).send().await?;
        decode(resp).await
    }

    pub async fn add_folder(&self, local_uri: &str, remote_uri: &str) -> Result<FolderResponse> {
        let body = AddFolderRequest {
            local_uri: local_uri.to_string(),
            remote_uri: remote_uri.to_string(),
        };
        let resp = self.http.post(self.url("/rest/folders")).json(&body).send().await?;
        decode(resp).await
    }

    pub async fn folders(&self) -> Result<Vec<FolderResponse>> {
        let resp = self.http.get(self.url("/rest/folders")).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    debug!(url = %resp.url(), status = status.as_u16(), "daemon responded");
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }

    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string(),
    };
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
