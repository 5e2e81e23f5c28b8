use serde_json::{Map, Value, json};

use crate::server::{Server, ServerDetails};
use crate::types::{Addresses, ServerStatus};

const PUBLIC_ADDRESS_FIELDS: &[&str] = &["ipAddress", "dnsName"];
const PRIVATE_ADDRESS_FIELDS: &[&str] = &["privateIpAddress", "privateDnsName"];

/// An EC2 instance payload as decoded from a Query API response.
#[derive(Debug, Clone, PartialEq)]
pub struct AwsInstance(Value);

impl AwsInstance {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// First string among `keys`, in order.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.str_field(k))
    }

    fn name_tag(&self) -> Option<&str> {
        ec2_api::item_list(&self.0, "tagSet")
            .into_iter()
            .find(|tag| tag.get("key").and_then(Value::as_str) == Some("Name"))
            .and_then(|tag| tag.get("value"))
            .and_then(Value::as_str)
    }

    /// Serialize a canonical server back into EC2 instance fields.
    pub fn from_server(server: &Server) -> Self {
        let mut raw = Map::new();
        let mut put = |key: &str, value: Option<&str>| {
            if let Some(v) = value {
                raw.insert(key.to_string(), Value::String(v.to_string()));
            }
        };

        put("instanceId", Some(server.id.as_str()));
        put("imageId", server.image.as_deref());
        put("instanceType", server.flavor.as_deref());
        put("subnetId", server.subnet.as_deref());
        put("launchTime", server.launch_time.as_deref());

        for (fields, values) in [
            (PUBLIC_ADDRESS_FIELDS, &server.addresses.public),
            (PRIVATE_ADDRESS_FIELDS, &server.addresses.private),
        ] {
            for (field, value) in fields.iter().zip(values) {
                put(*field, Some(value.as_str()));
            }
        }

        if let Some(state) = state_name(server.status) {
            raw.insert(
                "instanceState".into(),
                json!({ "code": state_code(server.status), "name": state }),
            );
        }
        if let Some(zone) = &server.zone {
            raw.insert("placement".into(), json!({ "availabilityZone": zone }));
        }
        if let Some(name) = &server.name {
            raw.insert(
                "tagSet".into(),
                json!({ "item": { "key": "Name", "value": name } }),
            );
        }

        Self(Value::Object(raw))
    }
}

impl ServerDetails for AwsInstance {
    fn id(&self) -> Option<&str> {
        self.str_field("instanceId")
    }

    /// Blank names fall through to the next source.
    fn name(&self) -> Option<&str> {
        let non_empty = |s: &&str| !s.is_empty();
        self.str_field("name")
            .filter(non_empty)
            .or_else(|| self.0.get("meta")?.get("name")?.as_str().filter(non_empty))
            .or_else(|| self.name_tag().filter(non_empty))
    }

    fn status(&self) -> ServerStatus {
        let Some(state) = self.0.get("instanceState") else {
            return ServerStatus::Unknown;
        };
        match state.get("name").and_then(Value::as_str) {
            Some(name) => status_from_name(name),
            None => state
                .get("code")
                .and_then(|c| match c {
                    Value::String(s) => s.parse::<u64>().ok(),
                    other => other.as_u64(),
                })
                .map(status_from_code)
                .unwrap_or_default(),
        }
    }

    fn addresses(&self) -> Addresses {
        let collect = |fields: &[&str]| -> Vec<String> {
            fields
                .iter()
                .filter_map(|f| self.str_field(f))
                .map(str::to_owned)
                .collect()
        };
        Addresses {
            public: collect(PUBLIC_ADDRESS_FIELDS),
            private: collect(PRIVATE_ADDRESS_FIELDS),
        }
    }

    fn image(&self) -> Option<&str> {
        self.first_of(&["image", "imageId"])
    }

    fn flavor(&self) -> Option<&str> {
        self.first_of(&["flavor", "instanceType"])
    }

    fn zone(&self) -> Option<&str> {
        self.str_field("zone").or_else(|| {
            self.0
                .get("placement")?
                .get("availabilityZone")?
                .as_str()
        })
    }

    fn subnet(&self) -> Option<&str> {
        self.first_of(&["subnet", "subnetId"])
    }

    fn launch_time(&self) -> Option<&str> {
        self.str_field("launchTime")
    }

    fn raw(&self) -> &Value {
        &self.0
    }
}

/// Map an EC2 `instanceState.name` to the canonical status.
pub fn status_from_name(name: &str) -> ServerStatus {
    match name.to_ascii_uppercase().as_str() {
        "PENDING" => ServerStatus::Provisioning,
        "RUNNING" => ServerStatus::Running,
        "STOPPING" | "STOPPED" => ServerStatus::Stopped,
        "TERMINATED" => ServerStatus::Terminated,
        _ => ServerStatus::Unknown,
    }
}

/// Map an EC2 `instanceState.code`; only the low byte is significant.
pub fn status_from_code(code: u64) -> ServerStatus {
    match code & 0xff {
        0 => ServerStatus::Provisioning,
        16 => ServerStatus::Running,
        48 => ServerStatus::Terminated,
        64 | 80 => ServerStatus::Stopped,
        _ => ServerStatus::Unknown,
    }
}

fn state_name(status: ServerStatus) -> Option<&'static str> {
    match status {
        ServerStatus::Provisioning => Some("pending"),
        ServerStatus::Running => Some("running"),
        ServerStatus::Stopped => Some("stopped"),
        ServerStatus::Terminated => Some("terminated"),
        ServerStatus::Unknown => None,
    }
}

fn state_code(status: ServerStatus) -> u64 {
    match status {
        ServerStatus::Provisioning => 0,
        ServerStatus::Running => 16,
        ServerStatus::Terminated => 48,
        ServerStatus::Stopped => 80,
        ServerStatus::Unknown => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(raw: Value) -> Server {
        Server::from_details(&AwsInstance::new(raw))
    }

    #[test]
    fn blank_names_fall_through_to_the_name_tag() {
        let tagged = instance(json!({
            "instanceId": "i-1",
            "name": "",
            "meta": { "name": "" },
            "tagSet": { "item": { "key": "Name", "value": "web-1" } }
        }));
        assert_eq!(tagged.name.as_deref(), Some("web-1"));

        let unnamed = instance(json!({
            "instanceId": "i-2",
            "meta": { "name": "" },
            "tagSet": { "item": { "key": "Name", "value": "" } }
        }));
        assert_eq!(unnamed.name, None);
    }

    #[test]
    fn state_names_map_case_insensitively() {
        let cases = [
            ("pending", ServerStatus::Provisioning),
            ("RUNNING", ServerStatus::Running),
            ("Stopping", ServerStatus::Stopped),
            ("stopped", ServerStatus::Stopped),
            ("terminated", ServerStatus::Terminated),
            ("shutting-down", ServerStatus::Unknown),
            ("", ServerStatus::Unknown),
            ("hibernating", ServerStatus::Unknown),
        ];
        for (name, expected) in cases {
            assert_eq!(status_from_name(name), expected, "state {name:?}");
        }
    }

    #[test]
    fn state_codes_use_low_byte() {
        assert_eq!(status_from_code(16), ServerStatus::Running);
        assert_eq!(status_from_code(16 + 256), ServerStatus::Running);
        assert_eq!(status_from_code(32), ServerStatus::Unknown);
        assert_eq!(status_from_code(48), ServerStatus::Terminated);
        assert_eq!(status_from_code(7), ServerStatus::Unknown);
    }

    #[test]
    fn missing_state_is_unknown() {
        assert_eq!(instance(json!({ "instanceId": "i-1" })).status, ServerStatus::Unknown);
        assert_eq!(
            instance(json!({ "instanceState": { "code": "80" } })).status,
            ServerStatus::Stopped
        );
        assert_eq!(
            instance(json!({ "instanceState": null })).status,
            ServerStatus::Unknown
        );
    }

    #[test]
    fn addresses_split_public_and_private_and_skip_non_strings() {
        let server = instance(json!({
            "instanceId": "i-1",
            "ipAddress": "54.1.2.3",
            "dnsName": null,
            "privateIpAddress": "10.0.0.5",
            "privateDnsName": { "nested": "x" },
        }));

        assert_eq!(server.addresses.public, vec!["54.1.2.3"]);
        assert_eq!(server.addresses.private, vec!["10.0.0.5"]);
    }

    #[test]
    fn full_payload_maps_every_field() {
        let raw = json!({
            "instanceId": "i-0abc",
            "imageId": "ami-1",
            "instanceType": "t3.micro",
            "subnetId": "subnet-1",
            "launchTime": "2024-01-01T00:00:00.000Z",
            "placement": { "availabilityZone": "us-east-1a", "tenancy": "default" },
            "instanceState": { "code": "16", "name": "running" },
            "dnsName": "ec2-54-1-2-3.compute-1.amazonaws.com",
            "ipAddress": "54.1.2.3",
            "privateDnsName": "ip-10-0-0-5.ec2.internal",
            "privateIpAddress": "10.0.0.5",
            "tagSet": { "item": [
                { "key": "team", "value": "infra" },
                { "key": "Name", "value": "web-1" }
            ] }
        });
        let server = instance(raw.clone());

        assert_eq!(server.id, "i-0abc");
        assert_eq!(server.name.as_deref(), Some("web-1"));
        assert_eq!(server.status, ServerStatus::Running);
        assert_eq!(server.image.as_deref(), Some("ami-1"));
        assert_eq!(server.flavor.as_deref(), Some("t3.micro"));
        assert_eq!(server.subnet.as_deref(), Some("subnet-1"));
        assert_eq!(server.zone.as_deref(), Some("us-east-1a"));
        assert_eq!(
            server.addresses.public,
            vec!["54.1.2.3", "ec2-54-1-2-3.compute-1.amazonaws.com"]
        );
        assert_eq!(
            server.addresses.private,
            vec!["10.0.0.5", "ip-10-0-0-5.ec2.internal"]
        );
        assert_eq!(server.original(), &raw);
    }

    #[test]
    fn explicit_name_wins_over_meta_and_tag() {
        let server = instance(json!({
            "name": "explicit",
            "meta": { "name": "from-meta" },
            "tagSet": { "item": { "key": "Name", "value": "from-tag" } }
        }));
        assert_eq!(server.name.as_deref(), Some("explicit"));

        let server = instance(json!({
            "meta": { "name": "from-meta" },
            "tagSet": { "item": { "key": "Name", "value": "from-tag" } }
        }));
        assert_eq!(server.name.as_deref(), Some("from-meta"));
    }

    #[test]
    fn round_trip_preserves_status_and_addresses() {
        for state in ["pending", "running", "stopping", "stopped", "terminated", "rebooting"] {
            let original = instance(json!({
                "instanceId": "i-1",
                "instanceState": { "name": state },
                "ipAddress": "54.1.2.3",
                "dnsName": "public.example",
                "privateIpAddress": "10.0.0.5",
                "tagSet": { "item": { "key": "Name", "value": "web" } },
                "placement": { "availabilityZone": "us-east-1b" }
            }));

            let rebuilt = Server::from_details(&AwsInstance::from_server(&original));

            assert_eq!(rebuilt.status, original.status, "state {state}");
            assert_eq!(rebuilt.addresses, original.addresses);
            assert_eq!(rebuilt.id, original.id);
            assert_eq!(rebuilt.name, original.name);
            assert_eq!(rebuilt.zone, original.zone);
        }
    }
}
