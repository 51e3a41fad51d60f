pub mod cloud_run;
pub mod mock;

use crate::models::{Service, ServiceName};
use async_trait::async_trait;
use thiserror::Error;

pub use cloud_run::{CloudRunDirectory, TokenSource};
pub use mock::MockDirectory;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Read/replace access to the desired state of deployed services.
#[async_trait]
pub trait DeploymentDirectory: Send + Sync {
    async fn get(&self, name: &ServiceName) -> Result<Service, DirectoryError>;

    async fn replace(
        &self,
        name: &ServiceName,
        service: &Service,
    ) -> Result<Service, DirectoryError>;
}
