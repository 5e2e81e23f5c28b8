pub mod amazon;
pub mod server;
pub mod types;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use server::{Server, ServerDetails};
pub use types::{
    ActionOk, Addresses, CreateServerOptions, Flavor, FlavorRef, Image, ImageRef, ServerRef,
    ServerStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("amazon provider error: {0}")]
    Amazon(#[from] ec2_api::Error),

    #[error("{0} is a required argument")]
    MissingArgument(&'static str),

    #[error("server not found: {0}")]
    NotFound(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Known compute provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Amazon,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amazon => "amazon",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "amazon" | "aws" => Ok(Self::Amazon),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

/// Provider-agnostic interface for managing servers.
///
/// Each method is one request/response against the provider. Nothing is
/// retried, cached or paginated.
#[async_trait]
pub trait ComputeClient: Send + Sync + 'static {
    /// Provider identifier.
    fn name(&self) -> ProviderName;

    /// API version this client speaks.
    async fn get_version(&self) -> Result<String>;

    /// Account limits, in the provider's own shape.
    async fn get_limits(&self) -> Result<serde_json::Value>;

    /// Every server visible to the account. Empty, never absent.
    async fn get_servers(&self) -> Result<Vec<Server>>;

    /// Create a server. Fails without an image before any request is made.
    async fn create_server(&self, options: &CreateServerOptions) -> Result<Server>;

    /// Fetch one server, or `Error::NotFound`.
    async fn get_server(&self, server: ServerRef<'_>) -> Result<Server>;

    async fn destroy_server(&self, server: ServerRef<'_>) -> Result<ActionOk>;

    async fn reboot_server(&self, server: ServerRef<'_>) -> Result<ActionOk>;

    async fn start_server(&self, server: ServerRef<'_>) -> Result<ActionOk>;

    async fn stop_server(&self, server: ServerRef<'_>) -> Result<ActionOk>;

    async fn rename_server(&self, server: ServerRef<'_>, name: &str) -> Result<ActionOk>;
}

/// `ComputeClient`s keyed by `ProviderName`, one per backend.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn ComputeClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn insert(&mut self, provider: Arc<dyn ComputeClient>) {
        self.providers.insert(provider.name(), provider);
    }

    /// The client serving `name`, if that backend was registered.
    pub fn get(&self, name: ProviderName) -> Option<&Arc<dyn ComputeClient>> {
        self.providers.get(&name)
    }

    /// Backends with a registered client, in no particular order.
    pub fn available(&self) -> Vec<ProviderName> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry holding a client for each backend that has credentials in the
/// environment (or `.env`).
///
/// A backend without credentials is left out. `Error::MissingEnv` means
/// none had any.
pub fn build_providers() -> Result<ProviderRegistry> {
    dotenvy::dotenv().ok();

    let mut registry = ProviderRegistry::new();

    match amazon::AmazonProvider::from_env() {
        Ok(p) => {
            tracing::info!(region = p.region(), "registered Amazon EC2 compute provider");
            registry.insert(Arc::new(p));
        }
        Err(e) => tracing::debug!("skipping Amazon provider: {e}"),
    }

    if registry.is_empty() {
        return Err(Error::MissingEnv(
            "no compute providers configured (set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY)"
                .into(),
        ));
    }

    Ok(registry)
}
