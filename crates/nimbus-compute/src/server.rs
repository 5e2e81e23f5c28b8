use serde::Serialize;
use serde_json::Value;

use crate::types::{
    ActionOk, Addresses, CreateServerOptions, FlavorRef, ImageRef, ServerRef, ServerStatus,
};
use crate::{ComputeClient, Result};

/// Provider-specific view over a raw server payload.
///
/// Each provider implements this for its own response shape; `Server`
/// copies the view into the canonical fields.
pub trait ServerDetails {
    fn id(&self) -> Option<&str>;
    fn name(&self) -> Option<&str>;
    fn status(&self) -> ServerStatus;
    fn addresses(&self) -> Addresses;
    fn image(&self) -> Option<&str>;
    fn flavor(&self) -> Option<&str>;
    fn zone(&self) -> Option<&str>;
    fn subnet(&self) -> Option<&str>;
    fn launch_time(&self) -> Option<&str>;
    fn raw(&self) -> &Value;
}

/// Canonical server entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Server {
    pub id: String,
    pub name: Option<String>,
    pub status: ServerStatus,
    pub addresses: Addresses,
    pub image: Option<String>,
    pub flavor: Option<String>,
    pub zone: Option<String>,
    pub subnet: Option<String>,
    pub launch_time: Option<String>,
    #[serde(skip)]
    original: Value,
}

impl Server {
    /// A handle to an existing server known only by id.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// A local server not yet created, to be passed to `create`.
    pub fn draft(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Default::default()
        }
    }

    pub fn from_details(details: &dyn ServerDetails) -> Self {
        let mut server = Self::default();
        server.set_properties(details);
        server
    }

    /// Overwrite every field from a fresh provider view.
    pub fn set_properties(&mut self, details: &dyn ServerDetails) {
        let owned = |v: Option<&str>| v.map(str::to_owned);

        self.id = details.id().unwrap_or_default().to_string();
        self.name = owned(details.name());
        self.status = details.status();
        self.addresses = details.addresses();
        self.image = owned(details.image());
        self.flavor = owned(details.flavor());
        self.zone = owned(details.zone());
        self.subnet = owned(details.subnet());
        self.launch_time = owned(details.launch_time());
        self.original = details.raw().clone();
    }

    /// The provider payload this server was last built from.
    pub fn original(&self) -> &Value {
        &self.original
    }

    /// Options that would create a server like this one.
    pub fn create_options(&self) -> CreateServerOptions {
        CreateServerOptions {
            name: self.name.clone(),
            image: self.image.clone().map(ImageRef::Id),
            flavor: self.flavor.clone().map(FlavorRef::Id),
            zone: self.zone.clone(),
            subnet: self.subnet.clone(),
            ..Default::default()
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub async fn create(&mut self, client: &dyn ComputeClient) -> Result<()> {
        let created = client.create_server(&self.create_options()).await?;
        *self = created;
        Ok(())
    }

    pub async fn refresh(&mut self, client: &dyn ComputeClient) -> Result<()> {
        let fresh = client.get_server(ServerRef::Server(self)).await?;
        *self = fresh;
        Ok(())
    }

    pub async fn destroy(&self, client: &dyn ComputeClient) -> Result<ActionOk> {
        client.destroy_server(self.into()).await
    }

    pub async fn reboot(&self, client: &dyn ComputeClient) -> Result<ActionOk> {
        client.reboot_server(self.into()).await
    }

    pub async fn start(&self, client: &dyn ComputeClient) -> Result<ActionOk> {
        client.start_server(self.into()).await
    }

    pub async fn stop(&self, client: &dyn ComputeClient) -> Result<ActionOk> {
        client.stop_server(self.into()).await
    }

    pub async fn rename(
        &mut self,
        client: &dyn ComputeClient,
        name: impl Into<String>,
    ) -> Result<ActionOk> {
        let name = name.into();
        let ok = client.rename_server(ServerRef::Server(self), &name).await?;
        self.name = Some(name);
        Ok(ok)
    }
}
