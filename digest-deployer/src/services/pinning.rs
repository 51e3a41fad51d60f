//! Digest pinning: turn one registry push into one service update.
//!
//! The pipeline is a straight line of fallible steps. Each step either hands
//! its value to the next one or ends the request with a [`PinError`]; the
//! caller logs the error and answers the delivery the same way regardless.

use crate::models::{PushEnvelope, RegistryEvent, Service, ServiceName};
use crate::services::directory::{DeploymentDirectory, DirectoryError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("cannot read incoming request body: {0}")]
    UnreadableBody(String),

    #[error("cannot parse outer JSON from incoming request body: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("cannot parse inner JSON from the message data: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    #[error("action is not insert but {0:?} instead")]
    NotInsert(String),

    #[error("digest {0:?} has no '@' separator")]
    MissingDigest(String),

    #[error("cannot fetch the service config: {0}")]
    Fetch(#[source] DirectoryError),

    #[error("service config has no container to update")]
    NoContainer,

    #[error("push to the wrong tag ({pushed:?} /= {deployed:?})")]
    TagMismatch { pushed: String, deployed: String },

    #[error("cannot update the service: {0}")]
    Replace(#[source] DirectoryError),
}

impl PinError {
    /// Log at a level matching how surprising the outcome is.
    pub fn log(&self) {
        match self {
            PinError::NotInsert(action) => {
                tracing::info!(action = %action, "{}", self);
            }
            PinError::TagMismatch { pushed, deployed } => {
                tracing::warn!(pushed = %pushed, deployed = %deployed, "{}", self);
            }
            _ => {
                tracing::error!(error = %self, "Push notification dropped");
            }
        }
    }
}

/// Result of a successful pin.
#[derive(Debug, Clone)]
pub struct PinOutcome {
    pub image: String,
    pub service: Service,
}

/// Pins one pre-configured service to the digests pushed for its tag.
pub struct DigestPinner {
    directory: Arc<dyn DeploymentDirectory>,
    target: ServiceName,
}

impl DigestPinner {
    pub fn new(directory: Arc<dyn DeploymentDirectory>, target: ServiceName) -> Self {
        Self { directory, target }
    }

    pub fn target(&self) -> &ServiceName {
        &self.target
    }

    #[tracing::instrument(
        name = "pin_digest",
        skip_all,
        fields(service = %self.target, message_id, tag, digest)
    )]
    pub async fn pin(&self, body: &[u8]) -> Result<PinOutcome, PinError> {
        let envelope = decode_envelope(body)?;
        if let Some(id) = &envelope.message.message_id {
            tracing::Span::current().record("message_id", id.as_str());
        }

        let event = decode_event(&envelope)?;
        tracing::Span::current()
            .record("tag", event.tag.as_str())
            .record("digest", event.digest.as_str());

        let image = actionable_image(&event)?;

        let mut service = self
            .directory
            .get(&self.target)
            .await
            .map_err(PinError::Fetch)?;

        apply_pin(&mut service, &event.tag, image.clone())?;

        self.directory
            .replace(&self.target, &service)
            .await
            .map_err(PinError::Replace)?;

        Ok(PinOutcome { image, service })
    }
}

fn decode_envelope(body: &[u8]) -> Result<PushEnvelope, PinError> {
    serde_json::from_slice(body).map_err(PinError::MalformedEnvelope)
}

fn decode_event(envelope: &PushEnvelope) -> Result<RegistryEvent, PinError> {
    serde_json::from_slice(&envelope.message.data).map_err(PinError::MalformedEvent)
}

/// The pinned reference for an insert event; checked before any remote call.
fn actionable_image(event: &RegistryEvent) -> Result<String, PinError> {
    if !event.is_insert() {
        return Err(PinError::NotInsert(event.action.clone()));
    }

    event
        .pinned_image()
        .ok_or_else(|| PinError::MissingDigest(event.digest.clone()))
}

/// Point the first container at `image` and clear the revision name, provided
/// the deployed repository is exactly the pushed tag.
fn apply_pin(service: &mut Service, tag: &str, image: String) -> Result<(), PinError> {
    let container = service
        .primary_container_mut()
        .ok_or(PinError::NoContainer)?;

    let deployed = container.repository();
    if deployed != tag {
        return Err(PinError::TagMismatch {
            pushed: tag.to_string(),
            deployed: deployed.to_string(),
        });
    }

    container.image = image;
    service.spec.template.metadata.name.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::INSERT_ACTION;
    use crate::services::directory::MockDirectory;
    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde_json::json;

    const TAG: &str = "gcr.io/proj1/api:latest";
    const DIGEST: &str = "gcr.io/proj1/api@sha256:abc123";

    fn push_body(action: &str, tag: &str, digest: &str) -> Vec<u8> {
        let event = json!({"action": action, "tag": tag, "digest": digest}).to_string();
        json!({"message": {"data": BASE64_STANDARD.encode(event), "messageId": "1"}})
            .to_string()
            .into_bytes()
    }

    fn pinner(directory: &Arc<MockDirectory>) -> DigestPinner {
        DigestPinner::new(directory.clone(), ServiceName::new("proj1", "api"))
    }

    #[tokio::test]
    async fn pins_matching_tag_to_digest() {
        let directory = Arc::new(MockDirectory::with_image(TAG));

        let outcome = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap();

        assert_eq!(outcome.image, "gcr.io/proj1/api:latest@sha256:abc123");

        let submitted = directory.submitted();
        assert_eq!(submitted.len(), 1);
        let (name, service) = &submitted[0];
        assert_eq!(name.as_str(), "namespaces/proj1/services/api");
        assert_eq!(service.primary_container().unwrap().image, outcome.image);
        assert_eq!(service.spec.template.metadata.name, "");
        // Service-level metadata is left alone.
        assert_eq!(service.metadata.name, "api");
    }

    #[tokio::test]
    async fn non_insert_makes_no_remote_calls() {
        let directory = Arc::new(MockDirectory::with_image(TAG));

        for action in ["DELETE", "insert", ""] {
            let err = pinner(&directory)
                .pin(&push_body(action, TAG, DIGEST))
                .await
                .unwrap_err();
            assert!(matches!(err, PinError::NotInsert(a) if a == action));
        }

        assert_eq!(directory.get_count(), 0);
        assert_eq!(directory.replace_count(), 0);
    }

    #[tokio::test]
    async fn malformed_input_makes_no_remote_calls() {
        let directory = Arc::new(MockDirectory::with_image(TAG));
        let inner_garbage = json!({"message": {"data": BASE64_STANDARD.encode("{not json")}})
            .to_string()
            .into_bytes();

        let outer = pinner(&directory).pin(b"{not json").await.unwrap_err();
        let inner = pinner(&directory).pin(&inner_garbage).await.unwrap_err();
        let empty = pinner(&directory).pin(b"{}").await.unwrap_err();

        assert!(matches!(outer, PinError::MalformedEnvelope(_)));
        assert!(matches!(inner, PinError::MalformedEvent(_)));
        assert!(matches!(empty, PinError::MalformedEvent(_)));
        assert_eq!(directory.get_count(), 0);
        assert_eq!(directory.replace_count(), 0);
    }

    #[tokio::test]
    async fn tag_mismatch_skips_the_write() {
        let directory = Arc::new(MockDirectory::with_image("gcr.io/proj1/api:stable"));

        let err = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap_err();

        match err {
            PinError::TagMismatch { pushed, deployed } => {
                assert_eq!(pushed, TAG);
                assert_eq!(deployed, "gcr.io/proj1/api:stable");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(directory.get_count(), 1);
        assert_eq!(directory.replace_count(), 0);
    }

    #[tokio::test]
    async fn already_pinned_service_compares_repository_portion() {
        let directory = Arc::new(MockDirectory::with_image(
            "gcr.io/proj1/api:latest@sha256:old",
        ));

        let outcome = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap();

        assert_eq!(outcome.image, "gcr.io/proj1/api:latest@sha256:abc123");
    }

    #[tokio::test]
    async fn digest_without_separator_is_dropped_before_fetch() {
        let directory = Arc::new(MockDirectory::with_image(TAG));

        let err = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, "sha256:abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, PinError::MissingDigest(_)));
        assert_eq!(directory.get_count(), 0);
    }

    #[tokio::test]
    async fn remote_failures_stop_the_pipeline() {
        let directory = Arc::new(MockDirectory::with_image(TAG));

        directory.set_fail_get(true);
        let err = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap_err();
        assert!(matches!(err, PinError::Fetch(_)));
        assert_eq!(directory.replace_count(), 0);

        directory.set_fail_get(false);
        directory.set_fail_replace(true);
        let err = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap_err();
        assert!(matches!(err, PinError::Replace(_)));
        assert_eq!(directory.current().primary_container().unwrap().image, TAG);
    }

    #[tokio::test]
    async fn service_without_containers_is_not_written() {
        let directory = Arc::new(MockDirectory::new(Service::default()));

        let err = pinner(&directory)
            .pin(&push_body(INSERT_ACTION, TAG, DIGEST))
            .await
            .unwrap_err();

        assert!(matches!(err, PinError::NoContainer));
        assert_eq!(directory.replace_count(), 0);
    }

    #[test]
    fn error_messages_carry_both_tags() {
        let err = PinError::TagMismatch {
            pushed: "a:1".into(),
            deployed: "a:2".into(),
        };
        assert_eq!(err.to_string(), r#"push to the wrong tag ("a:1" /= "a:2")"#);
    }
}
