use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "dirplan")]
#[command(about = "Plans and applies reorganizations of a sandboxed directory")]
#[command(version)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "DIRPLAN_BIND", default_value = "127.0.0.1:4000")]
    pub bind: String,

    /// Directory every client path is confined to
    #[arg(long, env = "SANDBOX_ROOT", default_value = "./sandbox")]
    pub sandbox_root: PathBuf,

    /// Directory copied into the sandbox on reset
    #[arg(long, env = "TEMPLATE_DIR", default_value = "./template")]
    pub template_dir: PathBuf,

    /// Base URL of an external organizer service (enables the first synthesis tier)
    #[arg(long, env = "ORGANIZER_URL")]
    pub organizer_url: Option<String>,

    /// Gemini API key (enables the generative synthesis tier)
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub gemini_model: String,

    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_base_url: String,

    /// Timeout for calls to the organizer and the model, in seconds
    #[arg(long, env = "DIRPLAN_EXTERNAL_TIMEOUT_SECS", default_value_t = 60)]
    pub external_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DIRPLAN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn organizer_url(&self) -> Option<&str> {
        non_blank(&self.organizer_url)
    }

    pub fn google_api_key(&self) -> Option<&str> {
        non_blank(&self.google_api_key)
    }
}

#[cfg(test)]
impl Config {
    /// Config built without consulting the environment: no external tiers.
    pub(crate) fn local(sandbox_root: PathBuf, template_dir: PathBuf) -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            sandbox_root,
            template_dir,
            organizer_url: None,
            google_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            external_timeout_secs: 2,
            log_level: "info".to_string(),
        }
    }
}
