//! Compute handler collaborator boundary.
//!
//! Handlers themselves live outside this crate; the composition engine only
//! references their source entry points and fixes the event/response shape
//! every handler honors so that route binding stays uniform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Reference to a handler's source entry point, e.g. `lambda/create-user.ts`.
/// The exported function name defaults to `handler`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRef {
    pub entry: String,
    #[serde(default = "HandlerRef::default_function")]
    pub function: String,
}

impl HandlerRef {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            function: Self::default_function(),
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    fn default_function() -> String {
        "handler".to_string()
    }

    /// Short name derived from the entry file stem, used to build handler
    /// logical ids (`<table>-<name>`).
    pub fn name(&self) -> &str {
        let base = self.entry.rsplit('/').next().unwrap_or(&self.entry);
        base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
    }

    /// Content fingerprint standing in for the compiled artifact id.
    pub fn artifact_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.entry.as_bytes());
        hasher.update(b"::");
        hasher.update(self.function.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Identity claims forwarded to a handler when its route is authorized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub subject: String,
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Normalized request every handler receives.
///
/// `claims` is present only when the route carries an authorizer. The payload
/// schema is the handler's own business; the engine never inspects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<IdentityClaims>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: Value,
}

/// Normalized two-part result every handler returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }
}
