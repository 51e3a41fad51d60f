use super::{DeploymentDirectory, DirectoryError};
use crate::models::{Service, ServiceName};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory directory holding a single service, for tests and dry runs.
///
/// A successful `replace` becomes the state returned by the next `get`.
pub struct MockDirectory {
    current: Mutex<Service>,
    submitted: Mutex<Vec<(ServiceName, Service)>>,
    get_count: AtomicU64,
    replace_count: AtomicU64,
    fail_get: AtomicBool,
    fail_replace: AtomicBool,
}

impl MockDirectory {
    pub fn new(service: Service) -> Self {
        Self {
            current: Mutex::new(service),
            submitted: Mutex::new(Vec::new()),
            get_count: AtomicU64::new(0),
            replace_count: AtomicU64::new(0),
            fail_get: AtomicBool::new(false),
            fail_replace: AtomicBool::new(false),
        }
    }

    /// A service whose only container runs `image`.
    pub fn with_image(image: &str) -> Self {
        let mut service = Service::default();
        service.metadata.name = "api".to_string();
        service.spec.template.metadata.name = "api-00001-abc".to_string();
        service.spec.template.spec.containers.push(crate::models::Container {
            image: image.to_string(),
            ..Default::default()
        });
        Self::new(service)
    }

    pub fn get_count(&self) -> u64 {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn replace_count(&self) -> u64 {
        self.replace_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    /// Every `(name, service)` pair passed to `replace`, oldest first.
    pub fn submitted(&self) -> Vec<(ServiceName, Service)> {
        self.submitted
            .lock()
            .map(|submitted| submitted.clone())
            .unwrap_or_default()
    }

    pub fn current(&self) -> Service {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeploymentDirectory for MockDirectory {
    async fn get(&self, name: &ServiceName) -> Result<Service, DirectoryError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_get.load(Ordering::SeqCst) {
            return Err(DirectoryError::Api {
                status: 503,
                body: "[MOCK] get unavailable".to_string(),
            });
        }

        tracing::info!(service = %name, "[MOCK] Service fetched");

        Ok(self.current())
    }

    async fn replace(
        &self,
        name: &ServiceName,
        service: &Service,
    ) -> Result<Service, DirectoryError> {
        self.replace_count.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push((name.clone(), service.clone()));
        }

        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(DirectoryError::Api {
                status: 409,
                body: "[MOCK] replace rejected".to_string(),
            });
        }

        if let Ok(mut current) = self.current.lock() {
            *current = service.clone();
        }

        tracing::info!(service = %name, "[MOCK] Service replaced");

        Ok(service.clone())
    }
}
