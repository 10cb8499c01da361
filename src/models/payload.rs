// Typed payload reported by an online upstream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys owned by [`super::StatusRecord`]; an upstream body can never override them.
pub(crate) const RESERVED_KEYS: [&str; 2] = ["server", "status"];

/// One scalar attribute from an upstream status document.
///
/// Nested arrays and objects are not representable, which keeps the pushed
/// wire format flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::String(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::String(s)
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        PayloadValue::Bool(b)
    }
}

impl From<u64> for PayloadValue {
    fn from(n: u64) -> Self {
        PayloadValue::Number(n.into())
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        PayloadValue::Number(n.into())
    }
}

/// Key-ordered attribute map; ordering keeps serialized snapshots byte-stable.
pub type Payload = BTreeMap<String, PayloadValue>;

/// Parse an upstream body as a flat JSON object of scalars.
/// Reserved keys are dropped so the record's own `server`/`status` win.
pub(crate) fn parse_payload(body: &[u8]) -> Result<Payload, serde_json::Error> {
    let mut payload: Payload = serde_json::from_slice(body)?;
    for key in RESERVED_KEYS {
        payload.remove(key);
    }
    Ok(payload)
}
