pub mod envelope;
pub mod service;

pub use envelope::{PushEnvelope, PushMessage, RegistryEvent, INSERT_ACTION};
pub use service::{
    repository_of, Container, ObjectMeta, RevisionSpec, RevisionTemplate, Service, ServiceName,
    ServiceSpec,
};
