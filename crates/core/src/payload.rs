use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind-specific request data.
///
/// The engine only ever inspects the declared fields the chain resolver
/// needs (`amount`, `category`, `subtype`); everything else rides along in
/// `extra` untouched, including attachment references, which are opaque
/// handles into an external store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestPayload {
    pub fn with_amount(amount: Decimal) -> Self {
        Self { amount: Some(amount), ..Self::default() }
    }
}
