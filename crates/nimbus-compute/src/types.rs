use serde::{Deserialize, Serialize};
use std::fmt;

use crate::server::Server;

/// Canonical, provider-agnostic server status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Provisioning,
    Running,
    Stopped,
    Terminated,
    #[default]
    Unknown,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public and private addresses of a server, in provider order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addresses {
    pub public: Vec<String>,
    pub private: Vec<String>,
}

/// A machine image (AMI on AWS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: Option<String>,
}

/// A hardware profile (instance type on AWS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: Option<String>,
}

/// An image given either by id or as a fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Id(String),
    Image(Image),
}

impl ImageRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Image(image) => &image.id,
        }
    }
}

impl From<&str> for ImageRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ImageRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Image> for ImageRef {
    fn from(image: Image) -> Self {
        Self::Image(image)
    }
}

/// A flavor given either by id or as a fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlavorRef {
    Id(String),
    Flavor(Flavor),
}

impl FlavorRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Flavor(flavor) => &flavor.id,
        }
    }
}

impl From<&str> for FlavorRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for FlavorRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<Flavor> for FlavorRef {
    fn from(flavor: Flavor) -> Self {
        Self::Flavor(flavor)
    }
}

/// A server given either by id or as an existing `Server`.
#[derive(Debug, Clone, Copy)]
pub enum ServerRef<'a> {
    Id(&'a str),
    Server(&'a Server),
}

impl ServerRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Server(server) => &server.id,
        }
    }
}

impl<'a> From<&'a str> for ServerRef<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a String> for ServerRef<'a> {
    fn from(id: &'a String) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Server> for ServerRef<'a> {
    fn from(server: &'a Server) -> Self {
        Self::Server(server)
    }
}

/// Options for creating a server. Only `image` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateServerOptions {
    pub name: Option<String>,
    pub image: Option<ImageRef>,
    pub flavor: Option<FlavorRef>,
    pub key_name: Option<String>,
    pub zone: Option<String>,
    pub subnet: Option<String>,
    pub security_group: Option<String>,
    pub security_group_id: Option<String>,
}

impl CreateServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn image(mut self, image: impl Into<ImageRef>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn flavor(mut self, flavor: impl Into<FlavorRef>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn subnet(mut self, subnet: impl Into<String>) -> Self {
        self.subnet = Some(subnet.into());
        self
    }

    pub fn security_group(mut self, group: impl Into<String>) -> Self {
        self.security_group = Some(group.into());
        self
    }

    pub fn security_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.security_group_id = Some(group_id.into());
        self
    }
}

/// Acknowledgement of a fire-and-forget server action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOk {
    pub ok: String,
}

impl ActionOk {
    pub fn new(id: impl Into<String>) -> Self {
        Self { ok: id.into() }
    }
}
