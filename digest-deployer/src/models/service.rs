//! Cloud Run (Knative serving v1) service resource.
//!
//! Only the fields the deployer reads or writes are typed. Everything else is
//! captured in `extra` so that a replace sends the resource back unchanged
//! apart from the image and the revision name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fully-qualified service identifier: `namespaces/<project>/services/<service>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(project: &str, service: &str) -> Self {
        Self(format!("namespaces/{}/services/{}", project, service))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(default)]
    pub template: RevisionTemplate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RevisionSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Empty means "let the server name the revision"; omitted on the wire.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Service {
    /// The container the deployer manages: the first one in the template.
    pub fn primary_container(&self) -> Option<&Container> {
        self.spec.template.spec.containers.first()
    }

    pub fn primary_container_mut(&mut self) -> Option<&mut Container> {
        self.spec.template.spec.containers.first_mut()
    }
}

impl Container {
    pub fn repository(&self) -> &str {
        repository_of(&self.image)
    }
}

/// Image reference up to the first `@`, or the whole reference if unpinned.
pub fn repository_of(image: &str) -> &str {
    image.split_once('@').map_or(image, |(repository, _)| repository)
}
