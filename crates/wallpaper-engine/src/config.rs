use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
pub const API_KEY_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Remote API settings. The key itself is not stored: it is looked up from
/// `api_key_vars` at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub api_base: String,
    pub image_model: String,
    pub edit_model: String,
    pub text_model: String,
    pub request_timeout: Duration,
    pub api_key_vars: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            edit_model: DEFAULT_EDIT_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
            api_key_vars: API_KEY_VARS.iter().map(|key| (*key).to_string()).collect(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            image_model: non_empty_env("WALLPAPER_IMAGE_MODEL").unwrap_or(defaults.image_model),
            edit_model: non_empty_env("WALLPAPER_EDIT_MODEL").unwrap_or(defaults.edit_model),
            text_model: non_empty_env("WALLPAPER_TEXT_MODEL").unwrap_or(defaults.text_model),
            request_timeout: non_empty_env("WALLPAPER_REQUEST_TIMEOUT")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.request_timeout),
            api_key_vars: defaults.api_key_vars,
        }
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key_vars.iter().find_map(|key| non_empty_env(key))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
