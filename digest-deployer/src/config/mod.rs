use crate::models::ServiceName;
use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct DeployerConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    /// Region of the Cloud Run service; selects the regional API endpoint.
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub project: String,
    /// Short service name inside the project.
    #[serde(default)]
    pub service: String,
    /// Overrides `https://<region>-run.googleapis.com`.
    #[serde(default)]
    pub run_api_endpoint: Option<String>,
    /// Static bearer token. When unset, tokens come from the metadata server.
    #[serde(default)]
    pub access_token: Option<Secret<String>>,
    #[serde(default)]
    pub metadata_token_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DeployerConfig {
    /// Load from `.env`, an optional `configuration` file and the process
    /// environment (`REGION`, `PROJECT`, `SERVICE`, `PORT`, ...).
    pub fn load() -> Result<Self, AppError> {
        Self::from_config(core_config::layered_source()?)
    }

    pub fn from_config(source: config::Config) -> Result<Self, AppError> {
        let config: DeployerConfig = source.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        require("REGION", &self.region)?;
        require("PROJECT", &self.project)?;
        require("SERVICE", &self.service)?;
        Ok(())
    }

    pub fn service_name(&self) -> ServiceName {
        ServiceName::new(&self.project, &self.service)
    }

    pub fn api_endpoint(&self) -> String {
        match &self.run_api_endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => format!("https://{}-run.googleapis.com", self.region),
        }
    }
}

fn require(key: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::config(format!("must specify {}", key)));
    }
    Ok(())
}
