//! HTTP client for the system of record.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::models::{EntryId, FieldEntry};
use crate::util::{normalize_base_url, summarize_server_message};

use super::error::{SyncError, SyncResult};
use super::remote::{Connectivity, RemoteEndpoint, SubmitOutcome, Submission, TenantCredentials};

const TENANT_ID_HEADER: &str = "X-Tenant-ID";
const TENANT_SECRET_HEADER: &str = "X-Tenant-Secret";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// reqwest-backed [`RemoteEndpoint`] and [`Connectivity`] check.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    credentials: TenantCredentials,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(settings: &SyncSettings, credentials: TenantCredentials) -> Result<Self> {
        let base_url = normalize_base_url(&settings.api_base_url)?;
        if credentials.tenant_id.trim().is_empty() {
            return Err(Error::Config("tenant id must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            credentials,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn submit_url(&self) -> String {
        format!("{}/v1/field-entries/sync", self.base_url)
    }

    fn entry_url(&self, id: &EntryId) -> String {
        format!(
            "{}/v1/field-entries/{}",
            self.base_url,
            urlencoding::encode(&id.as_str())
        )
    }

    fn with_tenant(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(TENANT_ID_HEADER, &self.credentials.tenant_id)
            .header(TENANT_SECRET_HEADER, &self.credentials.tenant_secret)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

impl RemoteEndpoint for HttpRemote {
    async fn submit(&self, submission: &Submission) -> SyncResult<SubmitOutcome> {
        let response = self
            .with_tenant(self.client.post(self.submit_url()))
            .json(submission)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        Ok(classify_submit_response(status, &body))
    }

    async fn fetch_canonical(&self, id: &EntryId) -> SyncResult<Option<FieldEntry>> {
        let response = self
            .with_tenant(self.client.get(self.entry_url(id)))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let message = parse_api_error(status, &body);
            return Err(if status.is_server_error() {
                SyncError::Transient(message)
            } else {
                SyncError::Permanent(message)
            });
        }

        serde_json::from_str::<FieldEntry>(&body)
            .map(Some)
            .map_err(|error| SyncError::Protocol(format!("invalid canonical entry: {error}")))
    }
}

impl Connectivity for HttpRemote {
    async fn is_online(&self) -> bool {
        let request = self
            .with_tenant(self.client.get(format!("{}/health", self.base_url)))
            .timeout(HEALTH_TIMEOUT);

        match request.send().await {
            Ok(response) => health_indicates_online(response.status()),
            Err(error) => {
                tracing::debug!("Health check failed: {error}");
                false
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    server_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Only a 2xx health answer counts as online.
fn health_indicates_online(status: StatusCode) -> bool {
    if status.is_success() {
        return true;
    }
    tracing::debug!("Health check answered {status}; treating device as offline");
    false
}

/// Map a submission response to an outcome.
fn classify_submit_response(status: StatusCode, body: &str) -> SubmitOutcome {
    if status.is_success() {
        let server_version = serde_json::from_str::<AcceptedBody>(body)
            .ok()
            .and_then(|accepted| accepted.server_version);
        return SubmitOutcome::Accepted { server_version };
    }
    if status == StatusCode::CONFLICT {
        return SubmitOutcome::Conflict;
    }

    let message = parse_api_error(status, body);
    if status.is_client_error() {
        SubmitOutcome::ValidationError(message)
    } else {
        SubmitOutcome::ServerError(message)
    }
}

fn transport_error(error: reqwest::Error) -> SyncError {
    if error.is_timeout() {
        SyncError::Timeout
    } else if error.is_connect() {
        SyncError::Offline
    } else {
        SyncError::Transient(error.to_string())
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", summarize_server_message(&message), status.as_u16());
        }
    }

    let trimmed = summarize_server_message(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
