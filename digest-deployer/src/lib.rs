pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use services::DigestPinner;
use std::sync::Arc;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub pinner: Arc<DigestPinner>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(pinner: Arc<DigestPinner>, max_body_bytes: usize) -> Self {
        Self {
            pinner,
            max_body_bytes,
        }
    }
}
