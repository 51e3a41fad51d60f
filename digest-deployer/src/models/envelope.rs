//! Push delivery envelope and the registry event it carries.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// The only registry action that triggers a deployment.
pub const INSERT_ACTION: &str = "INSERT";

/// Outer JSON body of a push subscription delivery.
#[derive(Debug, Default, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Decoded payload. Base64 on the wire; missing or null decodes to empty.
    #[serde(default, deserialize_with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

fn base64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

/// A container registry notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistryEvent {
    #[serde(default)]
    pub action: String,
    /// `repository@sha256:...`
    #[serde(default)]
    pub digest: String,
    /// Full tag reference, e.g. `gcr.io/proj/api:latest`.
    #[serde(default)]
    pub tag: String,
}

impl RegistryEvent {
    pub fn is_insert(&self) -> bool {
        self.action == INSERT_ACTION
    }

    /// Everything after the first `@` of the digest reference.
    pub fn digest_suffix(&self) -> Option<&str> {
        self.digest.split_once('@').map(|(_, suffix)| suffix)
    }

    /// `tag@<digest suffix>`, the reference the deployment is pinned to.
    pub fn pinned_image(&self) -> Option<String> {
        self.digest_suffix()
            .map(|suffix| format!("{}@{}", self.tag, suffix))
    }
}
