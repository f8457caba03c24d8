use crate::error::{OpinionError, Result};

/// Secrets and endpoint overrides read from the environment.
/// Everything tunable lives in the TOML [`FileConfig`](crate::FileConfig).
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub zhipu_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let config = Self {
            zhipu_api_key: non_empty("ZHIPU_API_KEY"),
            llm_base_url: non_empty("LLM_BASE_URL"),
            llm_model: non_empty("LLM_MODEL"),
        };

        config.log_keys();
        config
    }

    /// The API key, or a config error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.zhipu_api_key
            .as_deref()
            .ok_or_else(|| OpinionError::Config("ZHIPU_API_KEY is not set".into()))
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let n = v.char_indices().nth(5).map(|(i, _)| i).unwrap_or(v.len());
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  ZHIPU_API_KEY: {}", preview_opt(&self.zhipu_api_key));
        tracing::info!("  LLM_BASE_URL: {}", self.llm_base_url.as_deref().unwrap_or("<default>"));
        tracing::info!("  LLM_MODEL: {}", self.llm_model.as_deref().unwrap_or("<from config>"));
    }
}
