use serde::Deserialize;
use std::{fs, path::PathBuf};

const DEFAULT_CONFIG_PATH: &str = "ingestion-config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub site_tag: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.solcast.com.au".to_string(),
            site_tag: "bruny-island-research".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: None,
            password: None,
            max_connections: 1,
        }
    }
}

impl DatabaseConfig {
    /// Connection URI for `database`, which is either a full `postgres://` URI
    /// or a bare database name on the configured server.
    pub fn connect_url(&self, database: &str) -> String {
        if database.contains("://") {
            return database.to_string();
        }

        let credentials = match (&self.user, &self.password) {
            (Some(user), Some(password)) => format!("{user}:{password}@"),
            (Some(user), None) => format!("{user}@"),
            _ => String::new(),
        };

        format!(
            "postgres://{credentials}{}:{}/{database}",
            self.host, self.port
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// What the report does with a stored poll whose steps are off the 5 minute grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisalignedPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub chunk_days: u32,
    pub output_dir: PathBuf,
    pub field: String,
    pub on_misaligned: MisalignedPolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            chunk_days: 2,
            output_dir: PathBuf::from("."),
            field: "ghi".to_string(),
            on_misaligned: MisalignedPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub sink: SinkConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    /// Load from `INGESTION_CONFIG`, falling back to `ingestion-config.toml`
    /// and then to built-in defaults when that file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;
        use std::env;

        let path = match env::var("INGESTION_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !path.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_PATH} found, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}
