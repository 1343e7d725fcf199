use std::{env, str::FromStr};

use crate::lifecycle::EngineConfig;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_CONNECTION_TEMPLATE: &str =
    "Hi {first_name}, I came across your profile and your work at {company}. Would love to connect!";

pub const DEFAULT_FOLLOWUP_TEMPLATE: &str =
    "Hi {first_name}, thanks for connecting! I'd love to hear more about your work as {job_title} at {company}. Open to a quick chat?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Staging,
    Production,
}

impl FromStr for AppEnv {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "staging" | "stage" => Ok(AppEnv::Staging),
            "production" | "prod" => Ok(AppEnv::Production),
            _ => Ok(AppEnv::Development), // default if unknown
        }
    }
}

/// Which loops the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server,
    Worker,
    Both,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" | "api" => Ok(RunMode::Server),
            "worker" => Ok(RunMode::Worker),
            "both" | "all" => Ok(RunMode::Both),
            other => Err(format!("MODE must be server, worker or both (got '{other}')")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub mode: RunMode,
    pub database_url: String,
    pub http_port: u16,

    pub phantombuster_api_key: Option<String>,
    pub phantombuster_api_base: String,
    /// Agent that sends connection requests.
    pub phantom_id: Option<String>,
    /// Agent that sends follow-up messages. Falls back to `phantom_id`.
    pub followup_phantom_id: Option<String>,

    pub deepseek_api_key: Option<String>,
    pub deepseek_api_url: String,
    pub deepseek_model: String,

    /// LLM provider selection: "deepseek" or "template".
    /// When unset the provider is inferred from `deepseek_api_key`.
    pub llm_provider: Option<String>,

    /// Timeout applied to every outbound HTTP call.
    pub gateway_timeout_secs: u64,

    pub max_followup_attempts: i32,
    pub followup_delay_hours: i64,
    pub default_connection_template: String,
    /// Empty disables the follow-up fallback template.
    pub default_followup_template: String,

    pub worker_interval_secs: u64,
}

/// Entry point to load configuration
pub fn load() -> Result<Config> {
    load_dotenv()?;
    Config::from_env()
}

/// Load .env base, then .env.{APP_ENV}
fn load_dotenv() -> Result<()> {
    let _ = dotenvy::dotenv();

    let env_name = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    let filename = format!(".env.{}", env_name);
    let _ = dotenvy::from_filename(&filename);

    Ok(())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| format!("{name} has an invalid value '{raw}'").into()),
        _ => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let env = AppEnv::from_str(&env_str).unwrap_or(AppEnv::Development);

        let mode = match non_empty_var("MODE") {
            Some(raw) => RunMode::from_str(&raw)?,
            None => RunMode::Server,
        };

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://outreach.db?mode=rwc".to_string());

        let http_port: u16 = parse_var("HTTP_PORT", 3000)?;

        let phantombuster_api_key = non_empty_var("PHANTOMBUSTER_API_KEY");
        let phantombuster_api_base = env::var("PHANTOMBUSTER_API_BASE")
            .unwrap_or_else(|_| "https://api.phantombuster.com/api/v2".to_string());
        let phantom_id = non_empty_var("PHANTOM_ID");
        let followup_phantom_id = non_empty_var("FOLLOWUP_PHANTOM_ID").or_else(|| phantom_id.clone());

        let deepseek_api_key = non_empty_var("DEEPSEEK_API_KEY");
        let deepseek_api_url = env::var("DEEPSEEK_API_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com/v1/chat/completions".to_string());
        let deepseek_model = env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());
        let llm_provider = non_empty_var("LLM_PROVIDER");

        let gateway_timeout_secs: u64 = parse_var("GATEWAY_TIMEOUT_SECS", 30)?;

        let max_followup_attempts: i32 = parse_var("MAX_FOLLOWUP_ATTEMPTS", 3)?;
        if max_followup_attempts < 0 {
            return Err("MAX_FOLLOWUP_ATTEMPTS must not be negative".into());
        }
        let followup_delay_hours: i64 = parse_var("FOLLOWUP_DELAY_HOURS", 24)?;
        if followup_delay_hours < 0 {
            return Err("FOLLOWUP_DELAY_HOURS must not be negative".into());
        }

        let default_connection_template = env::var("DEFAULT_CONNECTION_TEMPLATE")
            .unwrap_or_else(|_| DEFAULT_CONNECTION_TEMPLATE.to_string());
        // An explicitly empty value is kept: it switches the follow-up fallback off.
        let default_followup_template = env::var("DEFAULT_FOLLOWUP_TEMPLATE")
            .unwrap_or_else(|_| DEFAULT_FOLLOWUP_TEMPLATE.to_string());

        let worker_interval_secs: u64 = parse_var("WORKER_INTERVAL_SECS", 900)?;

        Ok(Self {
            env,
            mode,
            database_url,
            http_port,
            phantombuster_api_key,
            phantombuster_api_base,
            phantom_id,
            followup_phantom_id,
            deepseek_api_key,
            deepseek_api_url,
            deepseek_model,
            llm_provider,
            gateway_timeout_secs,
            max_followup_attempts,
            followup_delay_hours,
            default_connection_template,
            default_followup_template,
            worker_interval_secs,
        })
    }

    /// The slice of configuration the lifecycle engine needs.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_followup_attempts: self.max_followup_attempts,
            followup_delay: chrono::Duration::hours(self.followup_delay_hours),
            default_connection_template: Some(self.default_connection_template.clone())
                .filter(|t| !t.trim().is_empty()),
            default_followup_template: Some(self.default_followup_template.clone())
                .filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Defaults only, without reading the environment.
#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        env: AppEnv::Development,
        mode: RunMode::Server,
        database_url: "sqlite::memory:".to_string(),
        http_port: 3000,
        phantombuster_api_key: None,
        phantombuster_api_base: "https://api.phantombuster.com/api/v2".to_string(),
        phantom_id: None,
        followup_phantom_id: None,
        deepseek_api_key: None,
        deepseek_api_url: "https://api.deepseek.com/v1/chat/completions".to_string(),
        deepseek_model: "deepseek-chat".to_string(),
        llm_provider: None,
        gateway_timeout_secs: 30,
        max_followup_attempts: 3,
        followup_delay_hours: 24,
        default_connection_template: DEFAULT_CONNECTION_TEMPLATE.to_string(),
        default_followup_template: DEFAULT_FOLLOWUP_TEMPLATE.to_string(),
        worker_interval_secs: 900,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parsing() {
        assert_eq!(AppEnv::from_str("PROD"), Ok(AppEnv::Production));
        assert_eq!(AppEnv::from_str("stage"), Ok(AppEnv::Staging));
        assert_eq!(AppEnv::from_str("whatever"), Ok(AppEnv::Development));
    }

    #[test]
    fn test_engine_config_drops_empty_followup_default() {
        let mut cfg = test_config();
        assert!(cfg.engine_config().default_followup_template.is_some());

        cfg.default_followup_template = String::new();
        let engine_cfg = cfg.engine_config();
        assert!(engine_cfg.default_followup_template.is_none());
        assert_eq!(engine_cfg.followup_delay, chrono::Duration::hours(24));
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!(RunMode::from_str("Worker"), Ok(RunMode::Worker));
        assert_eq!(RunMode::from_str("both"), Ok(RunMode::Both));
        assert!(RunMode::from_str("cron").is_err());
    }
}
