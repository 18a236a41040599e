//! HTTP implementation of the build service.

use async_trait::async_trait;
use dockyard_config::ClientConfig;
use dockyard_core::build::{ApplicationVersionBuildBundle, ApplicationVersionBuildInfo, BuildInfo};
use dockyard_core::error::{TransportError, TransportErrorKind};
use dockyard_core::id::BuildId;
use dockyard_core::log::LogEvent;
use dockyard_core::service::{BuildService, LogEventStream};
use dockyard_core::{Error, Result};
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::payload::{ApplicationVersionPayload, ApplicationVersionResponse, ImageBuildResponse};
use crate::sse::SseDecoder;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest silence tolerated on an open log stream.
pub const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

const ORGANIZATION_HEADER: HeaderName = HeaderName::from_static("x-forwarded-organization-id");
const PROJECT_HEADER: HeaderName = HeaderName::from_static("x-forwarded-project-id");

/// Client for the hosted image build service.
pub struct HttpBuildService {
    client: reqwest::Client,
    base_url: String,
    stream_idle_timeout: Duration,
}

impl HttpBuildService {
    /// Create a client from resolved configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers(config)?)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.build_service_url.trim_end_matches('/').to_string(),
            stream_idle_timeout: STREAM_IDLE_TIMEOUT,
        })
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    fn builds_url(&self) -> String {
        format!("{}/builds", self.base_url)
    }

    fn build_url(&self, id: &BuildId) -> String {
        format!("{}/builds/{}", self.base_url, urlencoding::encode(id.as_str()))
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(key) = &config.api_key {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
    }
    if let Some(org) = &config.organization_id {
        headers.insert(ORGANIZATION_HEADER, header_value(org)?);
    }
    if let Some(project) = &config.project_id {
        headers.insert(PROJECT_HEADER, header_value(project)?);
    }
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidInput(format!("invalid header value: {}", e)))
}

/// Map a reqwest failure onto the shared transport error.
fn request_error(err: reqwest::Error, method: &str, url: &str) -> Error {
    if err.is_decode() {
        return Error::Decode(err.to_string());
    }
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if let Some(status) = err.status() {
        TransportErrorKind::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: None,
        }
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportErrorKind::Network
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
        .with_request(method, url)
        .into()
}

/// Turn a non-success response into a status error carrying its body.
async fn check_status(
    response: reqwest::Response,
    method: &str,
    url: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.ok();
    Err(TransportError::status(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        body,
    )
    .with_request(method, url)
    .into())
}

#[async_trait]
impl BuildService for HttpBuildService {
    async fn submit(
        &self,
        request: ApplicationVersionBuildBundle,
    ) -> Result<ApplicationVersionBuildInfo> {
        let url = self.builds_url();
        let payload = ApplicationVersionPayload::from_bundle(&request);
        let json = serde_json::to_string(&payload)
            .map_err(|e| Error::Internal(format!("failed to encode request: {}", e)))?;

        let mut form = Form::new().part(
            "app_version",
            Part::text(json)
                .mime_str("application/json")
                .map_err(|e| request_error(e, "POST", &url))?,
        );
        for (image, bundle) in payload.images.iter().zip(&request.images) {
            let part = Part::bytes(bundle.context.to_vec())
                .file_name(format!("{}.tar.gz", image.context_tar_part_name))
                .mime_str("application/gzip")
                .map_err(|e| request_error(e, "POST", &url))?;
            form = form.part(image.context_tar_part_name.clone(), part);
        }

        info!(
            application = %request.name,
            version = %request.version,
            images = request.images.len(),
            "Submitting application version build"
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error(e, "POST", &url))?;
        let response = check_status(response, "POST", &url).await?;

        let body: ApplicationVersionResponse = response
            .json()
            .await
            .map_err(|e| request_error(e, "POST", &url))?;
        body.into_info()
    }

    async fn stream_logs(&self, id: &BuildId) -> Result<LogEventStream> {
        let url = format!("{}/logs", self.build_url(id));
        debug!(build_id = %id, "Opening log stream");

        // No total timeout: a stream lives as long as the build, but each
        // read must arrive within the idle timeout.
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| request_error(e, "GET", &url))?;
        let response = check_status(response, "GET", &url).await?;

        let idle = self.stream_idle_timeout;
        let chunks = futures::stream::unfold(Some(response.bytes_stream().boxed()), move |body| {
            let url = url.clone();
            async move {
                let mut body = body?;
                match tokio::time::timeout(idle, body.next()).await {
                    Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(body))),
                    Ok(Some(Err(e))) => Some((Err(request_error(e, "GET", &url)), None)),
                    Ok(None) => None,
                    Err(_) => {
                        let err = TransportError::timeout(format!(
                            "no log data received for {:?}",
                            idle
                        ))
                        .with_request("GET", &url);
                        Some((Err(err.into()), None))
                    }
                }
            }
        });

        let events = chunks
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items: Vec<Result<String>> = match chunk {
                    Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten()
            .filter_map(|item| async move {
                match item {
                    Ok(data) => match serde_json::from_str::<LogEvent>(&data) {
                        Ok(event) => Some(Ok(event)),
                        Err(e) => {
                            warn!(error = %e, "Skipping malformed log event");
                            None
                        }
                    },
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(events))
    }

    async fn build_info(&self, id: &BuildId) -> Result<BuildInfo> {
        let url = self.build_url(id);

        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error(e, "GET", &url))?;
        let response = check_status(response, "GET", &url).await?;

        let build: ImageBuildResponse = response
            .json()
            .await
            .map_err(|e| request_error(e, "GET", &url))?;
        Ok(build.into())
    }

    async fn cancel_build(&self, id: &BuildId) -> Result<()> {
        let url = format!("{}/cancel", self.build_url(id));
        info!(build_id = %id, "Requesting build cancellation");

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| request_error(e, "POST", &url))?;
        check_status(response, "POST", &url).await?;
        Ok(())
    }
}
