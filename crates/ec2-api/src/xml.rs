//! Converts Query API XML into a JSON-shaped tree.
//!
//! Text-only elements become strings and empty elements become `null`.
//! Elements with children become objects, and repeated sibling names
//! collapse into arrays. Attributes (namespaces) are dropped.

use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};

struct Node {
    name: String,
    text: String,
    children: Map<String, Value>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Map::new(),
        }
    }

    fn push_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }

    fn into_value(self) -> Value {
        if !self.children.is_empty() {
            Value::Object(self.children)
        } else if self.text.is_empty() {
            Value::Null
        } else {
            Value::String(self.text)
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse a document and return its root element name and converted body.
pub fn to_value(xml: &str) -> Result<(String, Value), String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => stack.push(Node::new(local_name(e.local_name().as_ref()))),
            Event::Empty(e) => {
                let name = local_name(e.local_name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.push_child(name, Value::Null),
                    None => root = Some((name, Value::Null)),
                }
            }
            Event::Text(t) => {
                if let Some(node) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    node.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unbalanced closing tag")?;
                let name = node.name.clone();
                let value = node.into_value();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".into());
    }
    root.ok_or_else(|| "empty document".into())
}

/// Normalize `parent.<set>.item` into a list.
///
/// A missing or empty set yields nothing and a single `item` yields one
/// element.
pub fn item_list<'a>(parent: &'a Value, set: &str) -> Vec<&'a Value> {
    match parent.get(set).and_then(|s| s.get("item")) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(item) => vec![item],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_nested_elements() {
        let (root, body) = to_value(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
                <requestId>req-1</requestId>
                <reservationSet>
                    <item>
                        <reservationId>r-1</reservationId>
                        <instancesSet>
                            <item><instanceId>i-1</instanceId><dnsName/></item>
                            <item><instanceId>i-2</instanceId></item>
                        </instancesSet>
                    </item>
                </reservationSet>
            </DescribeInstancesResponse>"#,
        )
        .unwrap();

        assert_eq!(root, "DescribeInstancesResponse");
        assert_eq!(
            body,
            json!({
                "requestId": "req-1",
                "reservationSet": {
                    "item": {
                        "reservationId": "r-1",
                        "instancesSet": {
                            "item": [
                                { "instanceId": "i-1", "dnsName": null },
                                { "instanceId": "i-2" }
                            ]
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn unescapes_entities() {
        let (_, body) = to_value("<R><message>a &amp; b</message></R>").unwrap();
        assert_eq!(body["message"], "a & b");
    }

    #[test]
    fn open_tag_without_close_is_an_error() {
        assert!(to_value("<R><a>1</a>").is_err());
        assert!(to_value("").is_err());
    }

    #[test]
    fn item_list_normalizes_shapes() {
        let many = json!({ "set": { "item": [1, 2, 3] } });
        let one = json!({ "set": { "item": 1 } });
        let empty = json!({ "set": null });

        assert_eq!(item_list(&many, "set").len(), 3);
        assert_eq!(item_list(&one, "set"), vec![&json!(1)]);
        assert!(item_list(&empty, "set").is_empty());
        assert!(item_list(&empty, "missing").is_empty());
    }
}
