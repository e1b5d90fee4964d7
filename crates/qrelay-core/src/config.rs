use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the relay backend.
#[derive(Clone, Debug)]
pub struct Config {
    // Gateway credentials
    pub gateway_url: String,
    pub api_id: i32,
    pub api_hash: String,

    // Persistence
    pub database_url: String,

    // HTTP surface
    pub bind_addr: String,
    /// Base URL clients use to fetch rendered QR images.
    pub public_base_url: String,
    /// Directory QR images are rendered into (served at `/sessions`).
    pub sessions_dir: PathBuf,

    // Authorization polling
    pub qr_wait_timeout: Duration,
    /// Attempt cap for the background poller; exhaustion marks the account
    /// inactive instead of retrying forever.
    pub qr_max_attempts: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let gateway_url = env_str("GATEWAY_URL")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("GATEWAY_URL environment variable is required".into()))?;
        let api_id = env_i32("API_ID")
            .ok_or_else(|| Error::Config("API_ID environment variable is required".into()))?;
        let api_hash = env_str("API_HASH")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("API_HASH environment variable is required".into()))?;

        let database_url =
            env_str("DATABASE_URL").unwrap_or_else(|| "sqlite://qrelay.db?mode=rwc".to_string());

        let bind_addr = env_str("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let public_base_url = env_str("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        let sessions_dir =
            PathBuf::from(env_str("SESSIONS_DIR").unwrap_or_else(|| "sessions".to_string()));
        fs::create_dir_all(&sessions_dir)?;

        let qr_wait_timeout = Duration::from_secs(env_u64("QR_WAIT_TIMEOUT_SECS").unwrap_or(10));
        let qr_max_attempts = env_u32("QR_MAX_ATTEMPTS").unwrap_or(60);

        Ok(Self {
            gateway_url,
            api_id,
            api_hash,
            database_url,
            bind_addr,
            public_base_url,
            sessions_dir,
            qr_wait_timeout,
            qr_max_attempts,
        })
    }

    /// Filesystem path of the rendered QR image for `phone`.
    pub fn qr_image_path(&self, phone: &str) -> PathBuf {
        self.sessions_dir.join(format!("{phone}_qr.png"))
    }

    /// Public URL of the rendered QR image for `phone`.
    pub fn qr_image_url(&self, phone: &str) -> String {
        format!("{}/sessions/{}_qr.png", self.public_base_url, phone)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_i32(key: &str) -> Option<i32> {
    env_str(key).and_then(|s| s.trim().parse::<i32>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
