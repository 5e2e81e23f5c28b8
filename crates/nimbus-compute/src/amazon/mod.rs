mod instance;

pub use instance::{AwsInstance, status_from_code, status_from_name};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ec2_api::{Credentials, Ec2Client, Filter, RunInstancesRequest, item_list};
use serde_json::{Value, json};
use tracing::info;

use crate::server::Server;
use crate::types::{ActionOk, CreateServerOptions, ServerRef};
use crate::{ComputeClient, Error, ProviderName, Result};

/// Instance state codes `get_server` asks for: pending, running,
/// shutting-down, stopping and stopped. Terminated instances are excluded.
const LIVE_STATE_CODES: [u16; 5] = [0, 16, 32, 64, 80];

/// AWS EC2 compute provider.
///
/// Delegates to `ec2_api::Ec2Client` for all HTTP calls.
pub struct AmazonProvider {
    client: Ec2Client,
    security_group: Option<String>,
    security_group_id: Option<String>,
}

impl AmazonProvider {
    pub fn new(client: Ec2Client) -> Self {
        Self {
            client,
            security_group: None,
            security_group_id: None,
        }
    }

    /// Security groups for every launch. When set, these take precedence
    /// over the ones in `CreateServerOptions`.
    pub fn with_security_groups(
        mut self,
        security_group: Option<String>,
        security_group_id: Option<String>,
    ) -> Self {
        self.security_group = security_group;
        self.security_group_id = security_group_id;
        self
    }

    /// Create from env vars:
    ///
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` (required)
    /// - `AWS_SESSION_TOKEN` (optional)
    /// - `AWS_REGION` (default: `"us-east-1"`)
    /// - `EC2_ENDPOINT`, `EC2_API_VERSION` (optional overrides)
    /// - `EC2_SECURITY_GROUP`, `EC2_SECURITY_GROUP_ID` (optional)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let access_key = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::MissingEnv("AWS_ACCESS_KEY_ID".into()))?;
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::MissingEnv("AWS_SECRET_ACCESS_KEY".into()))?;

        let mut credentials = Credentials::new(access_key, secret_key);
        if let Ok(token) = std::env::var("AWS_SESSION_TOKEN") {
            credentials = credentials.with_session_token(token);
        }

        let region =
            std::env::var("AWS_REGION").unwrap_or_else(|_| ec2_api::DEFAULT_REGION.into());

        let mut client = Ec2Client::new(credentials, region);
        if let Ok(endpoint) = std::env::var("EC2_ENDPOINT") {
            client = client.with_endpoint(endpoint);
        }
        if let Ok(version) = std::env::var("EC2_API_VERSION") {
            client = client.with_version(version);
        }

        Ok(Self::new(client).with_security_groups(
            std::env::var("EC2_SECURITY_GROUP").ok(),
            std::env::var("EC2_SECURITY_GROUP_ID").ok(),
        ))
    }

    pub fn region(&self) -> &str {
        self.client.region()
    }

    /// Flatten `reservationSet.item[].instancesSet.item[]`.
    fn instances(body: &Value) -> Vec<&Value> {
        item_list(body, "reservationSet")
            .into_iter()
            .flat_map(|reservation| item_list(reservation, "instancesSet"))
            .collect()
    }

    fn to_server(raw: &Value) -> Server {
        Server::from_details(&AwsInstance::new(raw.clone()))
    }

    fn run_request(&self, options: &CreateServerOptions) -> Result<RunInstancesRequest> {
        let image = options
            .image
            .as_ref()
            .ok_or(Error::MissingArgument("image"))?;

        let meta = json!({ "name": options.name.as_deref().unwrap_or_default() });

        let mut req = RunInstancesRequest::new(image.id());
        req.user_data = Some(BASE64.encode(meta.to_string()));
        req.instance_type = options.flavor.as_ref().map(|f| f.id().to_string());
        req.key_name = options.key_name.clone();
        req.availability_zone = options.zone.clone();
        req.subnet_id = options.subnet.clone();
        req.security_group = self
            .security_group
            .clone()
            .or_else(|| options.security_group.clone());
        req.security_group_id = self
            .security_group_id
            .clone()
            .or_else(|| options.security_group_id.clone());
        Ok(req)
    }
}

/// EC2 rejects unknown or badly formed instance ids outright instead of
/// returning an empty reservation set.
fn is_unknown_instance(err: &ec2_api::Error) -> bool {
    matches!(
        err.code(),
        Some("InvalidInstanceID.NotFound" | "InvalidInstanceID.Malformed")
    )
}

#[async_trait]
impl ComputeClient for AmazonProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Amazon
    }

    async fn get_version(&self) -> Result<String> {
        Ok(self.client.version().to_string())
    }

    async fn get_limits(&self) -> Result<Value> {
        Err(Error::Unsupported("AWS's API is not rate limited".into()))
    }

    async fn get_servers(&self) -> Result<Vec<Server>> {
        let resp = self.client.describe_instances(&[], &[]).await?;
        Ok(Self::instances(&resp.body)
            .into_iter()
            .map(Self::to_server)
            .collect())
    }

    async fn create_server(&self, options: &CreateServerOptions) -> Result<Server> {
        let req = self.run_request(options)?;
        let resp = self.client.run_instances(&req).await?;

        let instance = item_list(&resp.body, "instancesSet")
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::UnexpectedResponse("RunInstances returned no instances".into())
            })?;

        let mut raw = instance.clone();
        if let Value::Object(fields) = &mut raw {
            fields.insert(
                "meta".into(),
                json!({ "name": options.name.as_deref().unwrap_or_default() }),
            );
        }
        let server = Server::from_details(&AwsInstance::new(raw));

        info!(instance_id = %server.id, image = %req.image_id, "amazon: instance launched");
        Ok(server)
    }

    async fn get_server(&self, server: ServerRef<'_>) -> Result<Server> {
        let id = server.id();
        let filter = Filter::new("instance-state-code", LIVE_STATE_CODES);
        let resp = match self.client.describe_instances(&[id], &[filter]).await {
            Ok(resp) => resp,
            Err(e) if is_unknown_instance(&e) => return Err(Error::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        };

        Self::instances(&resp.body)
            .last()
            .map(|raw| Self::to_server(raw))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn destroy_server(&self, server: ServerRef<'_>) -> Result<ActionOk> {
        let id = server.id();
        self.client.terminate_instances(id).await?;
        info!(instance_id = %id, "amazon: instance terminated");
        Ok(ActionOk::new(id))
    }

    async fn reboot_server(&self, server: ServerRef<'_>) -> Result<ActionOk> {
        let id = server.id();
        self.client.reboot_instances(id).await?;
        info!(instance_id = %id, "amazon: instance rebooted");
        Ok(ActionOk::new(id))
    }

    async fn start_server(&self, server: ServerRef<'_>) -> Result<ActionOk> {
        let id = server.id();
        self.client.start_instances(id).await?;
        info!(instance_id = %id, "amazon: instance started");
        Ok(ActionOk::new(id))
    }

    async fn stop_server(&self, server: ServerRef<'_>) -> Result<ActionOk> {
        let id = server.id();
        self.client.stop_instances(id).await?;
        info!(instance_id = %id, "amazon: instance stopped");
        Ok(ActionOk::new(id))
    }

    async fn rename_server(&self, server: ServerRef<'_>, name: &str) -> Result<ActionOk> {
        let id = server.id();
        self.client.create_tags(id, &[("Name", name)]).await?;
        info!(instance_id = %id, name, "amazon: instance renamed");
        Ok(ActionOk::new(id))
    }
}
