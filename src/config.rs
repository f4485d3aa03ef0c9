use crate::error::AgentError;

pub const DEFAULT_BACKEND_URL: &str = "https://test.api.amadeus.com";
pub const DEFAULT_MODEL_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:8b";

#[derive(Clone)]
pub struct BackendOptions {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub proxy: Option<String>,
    pub timeout: u64,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            proxy: None,
            timeout: 30,
        }
    }
}

impl BackendOptions {
    pub fn require_credentials(&self) -> Result<(), AgentError> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(AgentError::Config(
                "flight backend credentials missing; set AMADEUS_KEY and AMADEUS_SECRET".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ModelOptions {
    pub base_url: String,
    pub model: String,
    pub timeout: u64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: 60,
        }
    }
}

#[derive(Clone, Default)]
pub struct Config {
    pub backend: BackendOptions,
    pub model: ModelOptions,
}
