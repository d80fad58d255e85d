//! HTTP request dispatcher
//!
//! Implements [`IRequestDispatcher`] over `reqwest`. JSON calls are posted to
//! `{base_url}{endpoint path}` with a `RequestVO` body; uploads are streamed
//! as multipart form data to `{base_url}/record/upload`; downloads are a
//! plain `GET` of the record's download URL.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permafiles_api::HttpDispatcher;
//! use permafiles_core::config::ApiConfig;
//!
//! # fn example() -> Result<(), permafiles_api::ApiError> {
//! let dispatcher = HttpDispatcher::new(&ApiConfig::default())?;
//! println!("talking to {}", dispatcher.base_url());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use permafiles_core::{
    config::ApiConfig,
    ports::{
        ApiRequest, DispatchError, DispatchResponse, IRequestDispatcher, ProgressFn,
        TransferRequest,
    },
};
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response,
};
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::payloads::request_body;
use crate::ApiError;

/// Path of the multipart content upload
pub const UPLOAD_PATH: &str = "/record/upload";

/// Connection setup limit, applied to every request including transfers
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatcher talking to the archive service over HTTP
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Whole-call limit for JSON calls; transfers are not bounded
    request_timeout: Duration,
}

impl HttpDispatcher {
    /// Create a dispatcher from the `api` configuration section
    ///
    /// # Errors
    ///
    /// Fails if the base URL does not parse or the HTTP client cannot be
    /// built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url)?;
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        })
    }

    /// Dispatcher against a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the key sent in every request envelope
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn upload(
        &self,
        record_id: i64,
        path: &std::path::Path,
        filename: String,
        mime_type: &str,
        size: u64,
        progress: ProgressFn,
    ) -> Result<DispatchResponse, DispatchError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            DispatchError::Transport(format!("cannot read {}: {e}", path.display()))
        })?;

        let mut sent = 0u64;
        let stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress(sent.min(size), size);
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), size)
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(transport)?;
        let mut form = Form::new().text("recordid", record_id.to_string());
        if let Some(key) = &self.api_key {
            form = form.text("apiKey", key.clone());
        }
        let form = form.part("file", part);

        let url = self.url(UPLOAD_PATH);
        debug!(%url, record_id, size, "uploading content");
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        read_body(check_status(response).await?).await
    }

    async fn download(
        &self,
        url: &str,
        progress: ProgressFn,
    ) -> Result<DispatchResponse, DispatchError> {
        debug!(url, "downloading content");
        let response = self.client.get(url).send().await.map_err(transport)?;
        let response = check_status(response).await?;

        let total = response.content_length().unwrap_or(0);
        let mut bytes = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            bytes.extend_from_slice(&chunk);
            if total > 0 {
                progress((bytes.len() as u64).min(total), total);
            }
        }
        let done = bytes.len() as u64;
        progress(done, done);

        debug!(url, bytes = done, "download complete");
        Ok(DispatchResponse::Binary(bytes))
    }
}

#[async_trait::async_trait]
impl IRequestDispatcher for HttpDispatcher {
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint))]
    async fn execute(&self, request: ApiRequest) -> Result<DispatchResponse, DispatchError> {
        let url = self.url(&request.endpoint.path());
        let body = request_body(
            &request.endpoint,
            self.api_key.as_deref(),
            request.csrf.as_ref(),
        );
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        read_body(check_status(response).await?).await
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressFn,
    ) -> Result<DispatchResponse, DispatchError> {
        match request {
            TransferRequest::Upload {
                record_id,
                path,
                filename,
                mime_type,
                size,
            } => {
                self.upload(record_id.get(), &path, filename, &mime_type, size, progress)
                    .await
            }
            TransferRequest::Download { url } => self.download(&url, progress).await,
        }
    }
}

fn transport(error: reqwest::Error) -> DispatchError {
    if error.is_timeout() {
        DispatchError::Transport("The request timed out.".to_string())
    } else {
        DispatchError::Transport(error.to_string())
    }
}

/// Turn a non-success status into [`DispatchError::Status`]
async fn check_status(response: Response) -> Result<Response, DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    warn!(code = status.as_u16(), %message, "request failed");
    Err(DispatchError::Status {
        code: status.as_u16(),
        message,
    })
}

/// JSON bodies come back as [`DispatchResponse::Json`], anything else as bytes
async fn read_body(response: Response) -> Result<DispatchResponse, DispatchError> {
    let bytes = response.bytes().await.map_err(transport)?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(DispatchResponse::Json(value)),
        Err(_) => Ok(DispatchResponse::Binary(bytes.to_vec())),
    }
}

/// First server message in an error body, if there is one
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.chars().take(200).collect());
    };
    value
        .pointer("/Results/0/message/0")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
