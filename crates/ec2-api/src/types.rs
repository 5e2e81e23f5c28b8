use std::collections::BTreeMap;
use std::fmt;

// ── Credentials ──────────────────────────────────────────────────────

/// Static AWS credentials used to sign every request.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ── Query parameters ─────────────────────────────────────────────────

/// Flat key/value parameters of a Query API call, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds `prefix.1 .. prefix.N` for each value.
    pub fn insert_list<I, V>(&mut self, prefix: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for (i, value) in values.into_iter().enumerate() {
            self.insert(format!("{prefix}.{}", i + 1), value);
        }
        self
    }

    /// Adds `Filter.{index}.Name` and `Filter.{index}.Value.N`.
    pub fn insert_filter(&mut self, index: usize, filter: &Filter) -> &mut Self {
        self.insert(format!("Filter.{index}.Name"), &filter.name);
        self.insert_list(&format!("Filter.{index}.Value"), &filter.values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Form-encodes the parameters for a request body.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A `DescribeInstances` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }
}

// ── Instance requests ────────────────────────────────────────────────

/// Parameters for `RunInstances`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInstancesRequest {
    pub image_id: String,
    pub min_count: u32,
    pub max_count: u32,
    pub instance_type: Option<String>,
    pub key_name: Option<String>,
    pub availability_zone: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group: Option<String>,
    pub security_group_id: Option<String>,
    /// Already base64-encoded.
    pub user_data: Option<String>,
}

impl RunInstancesRequest {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            min_count: 1,
            max_count: 1,
            instance_type: None,
            key_name: None,
            availability_zone: None,
            subnet_id: None,
            security_group: None,
            security_group_id: None,
            user_data: None,
        }
    }

    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new()
            .with("ImageId", &self.image_id)
            .with("MinCount", self.min_count)
            .with("MaxCount", self.max_count);

        if let Some(t) = &self.instance_type {
            params.insert("InstanceType", t);
        }
        if let Some(k) = &self.key_name {
            params.insert("KeyName", k);
        }
        if let Some(z) = &self.availability_zone {
            params.insert("Placement.AvailabilityZone", z);
        }
        if let Some(s) = &self.subnet_id {
            params.insert("SubnetId", s);
        }
        if let Some(g) = &self.security_group {
            params.insert("SecurityGroup.1", g);
        }
        if let Some(g) = &self.security_group_id {
            params.insert("SecurityGroupId.1", g);
        }
        if let Some(u) = &self.user_data {
            params.insert("UserData", u);
        }
        params
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// A decoded Query API response.
///
/// `body` is the response's root element converted to JSON, e.g. the
/// children of `<DescribeInstancesResponse>`.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub status: reqwest::StatusCode,
    pub request_id: Option<String>,
    pub body: serde_json::Value,
}
