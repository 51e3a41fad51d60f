pub mod directory;
pub mod pinning;

pub use directory::{
    CloudRunDirectory, DeploymentDirectory, DirectoryError, MockDirectory, TokenSource,
};
pub use pinning::{DigestPinner, PinError, PinOutcome};
