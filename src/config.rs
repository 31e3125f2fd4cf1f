use serde::{Serialize, Deserialize};

/// Environment variable that overrides `GatewayConfig::base_url`.
pub const BACKEND_URL_ENV: &str = "CONVSCOPE_BACKEND_URL";

/// Where the backend lives and how requests to it are addressed.
///
/// Fields:
/// - `base_url`: scheme + host + port, e.g. `http://127.0.0.1:8000`
/// - `api_prefix`: path prefix shared by every analysis endpoint (`/api`)
/// - `user_agent`: sent with every request
///
/// Can be saved to / loaded from JSON; every field is optional in the file and
/// falls back to the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_prefix: String,
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            base_url:   "http://127.0.0.1:8000".to_owned(),
            api_prefix: "/api".to_owned(),
            user_agent: concat!("convscope/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl GatewayConfig {
    /// Default config pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        GatewayConfig { base_url: base_url.into(), ..GatewayConfig::default() }
    }

    /// Applies `CONVSCOPE_BACKEND_URL` if it is set and non-empty.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.base_url = url.to_owned();
            }
        }
        self
    }

    /// URL of an analysis endpoint, e.g. `endpoint("/layers")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url.trim_end_matches('/'), normalize_prefix(&self.api_prefix), path)
    }

    /// URL outside the API prefix (health checks live at the root).
    pub fn root_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes a config from a JSON file.
    pub fn load_json(path: &str) -> std::io::Result<GatewayConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
