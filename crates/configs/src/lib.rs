use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Optional separate listener for `/healthz` + `/metrics`.
    #[serde(default)]
    pub admin_addr: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8000, worker_threads: Some(4), admin_addr: None }
    }
}

/// Where the JSON documents live. Relative file names are resolved against `data_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_votes_file")]
    pub votes_file: String,
    #[serde(default = "default_reviews_file")]
    pub reviews_file: String,
    #[serde(default)]
    pub catalog_file: Option<String>,
}

fn default_data_dir() -> String { "data".into() }
fn default_votes_file() -> String { "polls.json".into() }
fn default_reviews_file() -> String { "reviews.json".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            votes_file: default_votes_file(),
            reviews_file: default_reviews_file(),
            catalog_file: None,
        }
    }
}

fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Config file if present, otherwise defaults overlaid with env vars.
    /// A present but malformed file is still an error.
    pub fn load_or_env() -> Result<Self> {
        let path = config_path();
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            let mut cfg = AppConfig::default();
            cfg.server.apply_env();
            cfg
        };
        cfg.storage.apply_env();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // 归一化 server
        self.server.normalize()?;
        self.storage.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if let Ok(addr) = std::env::var("ADMIN_ADDR") {
            self.admin_addr = Some(addr);
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        if let Some(addr) = &self.admin_addr {
            if addr.trim().is_empty() {
                self.admin_addr = None;
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    /// `VOTES_FILE` / `REVIEWS_FILE` / `POLL_CATALOG` override whatever the file said.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("DATA_DIR") {
            self.data_dir = dir;
        }
        if let Ok(v) = std::env::var("VOTES_FILE") {
            self.votes_file = v;
        }
        if let Ok(v) = std::env::var("REVIEWS_FILE") {
            self.reviews_file = v;
        }
        if let Ok(v) = std::env::var("POLL_CATALOG") {
            self.catalog_file = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir must not be empty"));
        }
        if self.votes_file.trim().is_empty() {
            return Err(anyhow!("storage.votes_file must not be empty"));
        }
        if self.reviews_file.trim().is_empty() {
            return Err(anyhow!("storage.reviews_file must not be empty"));
        }
        if self.votes_file == self.reviews_file {
            return Err(anyhow!("storage.votes_file and storage.reviews_file must differ"));
        }
        Ok(())
    }
}
