//! Typed Rust client for the AWS EC2 Query API.
//!
//! Covers the subset needed for managing compute instances:
//! instances (describe, run, terminate, reboot, start, stop) and tags.
//! Every call is a single SigV4-signed POST; there are no retries and no
//! pagination.

mod signing;
mod types;
pub mod xml;

pub use types::*;
pub use xml::item_list;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_API_VERSION: &str = "2016-11-15";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ec2 api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ec2 api {action} returned {status}: {code}: {message}")]
    Api {
        action: &'static str,
        status: reqwest::StatusCode,
        code: String,
        message: String,
    },

    #[error("ec2 api {action} returned malformed xml: {reason}")]
    Xml { action: &'static str, reason: String },

    #[error("invalid ec2 endpoint: {0}")]
    InvalidEndpoint(String),
}

impl Error {
    /// Provider error code (e.g. `InvalidInstanceID.NotFound`), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the EC2 Query API.
#[derive(Clone)]
pub struct Ec2Client {
    credentials: Credentials,
    region: String,
    endpoint: String,
    version: String,
    http: reqwest::Client,
}

impl Ec2Client {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            credentials,
            endpoint: format!("https://ec2.{region}.amazonaws.com"),
            region,
            version: DEFAULT_API_VERSION.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Send requests somewhere other than the regional endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue a single signed Query API call.
    pub async fn query(&self, action: &'static str, params: &QueryParams) -> Result<QueryResponse> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(Error::InvalidEndpoint(self.endpoint.clone())),
        };

        let body = params
            .clone()
            .with("Action", action)
            .with("Version", &self.version)
            .encode();

        let headers = signing::sign(&signing::SigningInput {
            credentials: &self.credentials,
            region: &self.region,
            host: &host,
            path: url.path(),
            body: &body,
            now: Utc::now(),
        });

        debug!(action, endpoint = %self.endpoint, params = params.len(), "ec2: sending query");

        let mut req = self
            .http
            .post(url)
            .header("content-type", signing::CONTENT_TYPE)
            .body(body);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let err = Self::api_error(action, status, &text);
            warn!(action, %status, code = err.code().unwrap_or_default(), "ec2: query failed");
            return Err(err);
        }

        let (_, body) = xml::to_value(&text).map_err(|reason| Error::Xml { action, reason })?;
        let request_id = body
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(QueryResponse {
            status,
            request_id,
            body,
        })
    }

    /// Build an `Error::Api` from an `<Response><Errors><Error>` document,
    /// falling back to the raw text when the body is not XML.
    fn api_error(action: &'static str, status: reqwest::StatusCode, text: &str) -> Error {
        let parsed = xml::to_value(text).ok().and_then(|(_, body)| {
            let error = body.get("Errors")?.get("Error")?;
            let error = match error {
                Value::Array(all) => all.first()?,
                one => one,
            };
            let code = error.get("Code")?.as_str()?.to_string();
            let message = error
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((code, message))
        });

        let (code, message) = parsed.unwrap_or_else(|| {
            (
                status.canonical_reason().unwrap_or("Unknown").to_string(),
                text.to_string(),
            )
        });

        Error::Api {
            action,
            status,
            code,
            message,
        }
    }

    // ── Instances ────────────────────────────────────────────────────

    pub async fn describe_instances(
        &self,
        instance_ids: &[&str],
        filters: &[Filter],
    ) -> Result<QueryResponse> {
        let mut params = QueryParams::new();
        params.insert_list("InstanceId", instance_ids);
        for (i, filter) in filters.iter().enumerate() {
            params.insert_filter(i + 1, filter);
        }
        self.query("DescribeInstances", &params).await
    }

    pub async fn run_instances(&self, req: &RunInstancesRequest) -> Result<QueryResponse> {
        self.query("RunInstances", &req.to_params()).await
    }

    pub async fn terminate_instances(&self, instance_id: &str) -> Result<QueryResponse> {
        self.query("TerminateInstances", &Self::instance_param(instance_id))
            .await
    }

    pub async fn reboot_instances(&self, instance_id: &str) -> Result<QueryResponse> {
        self.query("RebootInstances", &Self::instance_param(instance_id))
            .await
    }

    pub async fn stop_instances(&self, instance_id: &str) -> Result<QueryResponse> {
        self.query("StopInstances", &Self::instance_param(instance_id))
            .await
    }

    pub async fn start_instances(&self, instance_id: &str) -> Result<QueryResponse> {
        self.query("StartInstances", &Self::instance_param(instance_id))
            .await
    }

    fn instance_param(instance_id: &str) -> QueryParams {
        QueryParams::new().with("InstanceId.1", instance_id)
    }

    // ── Tags ─────────────────────────────────────────────────────────

    pub async fn create_tags(
        &self,
        resource_id: &str,
        tags: &[(&str, &str)],
    ) -> Result<QueryResponse> {
        let mut params = QueryParams::new().with("ResourceId.1", resource_id);
        for (i, (key, value)) in tags.iter().enumerate() {
            params.insert(format!("Tag.{}.Key", i + 1), key);
            params.insert(format!("Tag.{}.Value", i + 1), value);
        }
        self.query("CreateTags", &params).await
    }
}
