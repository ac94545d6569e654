use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::BoxError;

pub const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 30;

/// Service configuration, resolved once at startup and handed to the
/// pipeline components at construction time. No component reads
/// process-wide globals.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
    /// Endpoint of the mail-sending collaborator.
    pub mail_endpoint: String,
    pub mail_timeout: Duration,
    /// When set, an actor mentioning themselves is not notified.
    pub suppress_self_mentions: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let host = env::var("TASKFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("TASKFLOW_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8090);

        let store_path =
            resolve_path(env::var("TASKFLOW_DB_PATH").unwrap_or_else(|_| "taskflow.db".to_string()))?;

        let mail_endpoint = env::var("MAIL_ENDPOINT_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| "MAIL_ENDPOINT_URL is not set".to_string())?;

        let mail_timeout = env::var("MAIL_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_MAIL_TIMEOUT_SECS));

        let suppress_self_mentions = env_flag("SUPPRESS_SELF_MENTIONS", false);

        Ok(Self {
            host,
            port,
            store_path,
            mail_endpoint,
            mail_timeout,
            suppress_self_mentions,
        })
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}
