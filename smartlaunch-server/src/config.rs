use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub smart: SmartSettings,
    pub session: SessionSettings,
    pub http: HttpSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL, shown on the index page
    pub public_url: String,
}

/// OAuth client registration with the EHR
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Secret used to sign the session cookie
    pub secret: Option<String>,
    pub ttl_secs: u64,
    pub backend: SessionBackend,
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout for outbound SMART/FHIR calls
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for SmartSettings {
    fn default() -> Self {
        Self {
            client_id: "my-smart-app".to_string(),
            redirect_uri: "http://localhost:8000/callback".to_string(),
            scope: "launch patient/*.read openid profile".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_secs: 600,
            backend: SessionBackend::Memory,
            sqlite_path: PathBuf::from("data/sessions.sqlite"),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply `SMARTLAUNCH_*` overrides from the given lookup
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("SMARTLAUNCH_PORT")
            && let Ok(port_num) = port.parse()
        {
            self.server.port = port_num;
        }

        if let Some(host) = var("SMARTLAUNCH_HOST") {
            self.server.host = host;
        }

        if let Some(public_url) = var("SMARTLAUNCH_PUBLIC_URL") {
            self.server.public_url = public_url;
        }

        if let Some(client_id) = var("SMARTLAUNCH_CLIENT_ID") {
            self.smart.client_id = client_id;
        }

        if let Some(redirect_uri) = var("SMARTLAUNCH_REDIRECT_URI") {
            self.smart.redirect_uri = redirect_uri;
        }

        if let Some(secret) = var("SMARTLAUNCH_SESSION_SECRET").filter(|s| !s.is_empty()) {
            self.session.secret = Some(secret);
        }

        match var("SMARTLAUNCH_SESSION_BACKEND").as_deref() {
            Some("memory") => self.session.backend = SessionBackend::Memory,
            Some("sqlite") => self.session.backend = SessionBackend::Sqlite,
            Some(other) => {
                tracing::warn!(backend = other, "Unknown session backend, keeping configured one")
            }
            None => {}
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// URL to register with the EHR as the app's launch URL
    pub fn launch_url(&self) -> String {
        format!("{}/launch", self.server.public_url.trim_end_matches('/'))
    }
}
