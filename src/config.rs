use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub draw: DrawConfig,
    #[serde(default)]
    pub gacha: GachaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS 允许的来源，为空时允许任意来源
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "data/store.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DrawConfig {
    /// 抽取随机源的固定种子，未设置时使用系统熵
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GachaConfig {
    #[serde(default = "default_max_prizes")]
    pub max_prizes: usize,
    #[serde(default = "default_max_attempts_limit")]
    pub max_attempts_limit: u32,
}

impl Default for GachaConfig {
    fn default() -> Self {
        Self {
            max_prizes: default_max_prizes(),
            max_attempts_limit: default_max_attempts_limit(),
        }
    }
}

fn default_max_prizes() -> usize {
    30
}

fn default_max_attempts_limit() -> u32 {
    1000
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)
                .with_context(|| format!("failed to parse config file {config_path}"))?,
            // 无配置文件：使用环境变量与默认值构建
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env(),
            Err(e) => bail!("cannot read config file {config_path}: {e}"),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    fn from_env() -> Self {
        Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
                allowed_origins: Vec::new(),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET")
                    .unwrap_or_else(|| "change-me-in-production".to_string()),
                access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                refresh_token_expires_in: get_env_parse("JWT_REFRESH_EXPIRES_IN", 2_592_000i64),
            },
            store: StoreConfig::default(),
            draw: DrawConfig::default(),
            gacha: GachaConfig::default(),
        }
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.server.allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            match v.to_ascii_lowercase().as_str() {
                "memory" => self.store.backend = StoreBackend::Memory,
                "file" => self.store.backend = StoreBackend::File,
                other => log::warn!("Ignoring unknown STORE_BACKEND value: {other}"),
            }
        }
        if let Ok(v) = env::var("STORE_PATH") {
            self.store.path = v;
        }
        if let Ok(v) = env::var("DRAW_SEED")
            && let Ok(seed) = v.parse()
        {
            self.draw.seed = Some(seed);
        }
        if let Ok(v) = env::var("GACHA_MAX_PRIZES")
            && let Ok(n) = v.parse()
        {
            self.gacha.max_prizes = n;
        }
        if let Ok(v) = env::var("GACHA_MAX_ATTEMPTS_LIMIT")
            && let Ok(n) = v.parse()
        {
            self.gacha.max_attempts_limit = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 60
            refresh_token_expires_in = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.gacha.max_prizes, 30);
        assert!(config.draw.seed.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 60
            refresh_token_expires_in = 600

            [store]
            backend = "file"
            path = "/tmp/raffle.json"

            [draw]
            seed = 42

            [gacha]
            max_prizes = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.path, "/tmp/raffle.json");
        assert_eq!(config.draw.seed, Some(42));
        assert_eq!(config.gacha.max_prizes, 12);
        assert_eq!(config.gacha.max_attempts_limit, 1000);
    }

    #[test]
    fn test_parse_rejects_missing_server() {
        assert!(Config::parse("[jwt]\nsecret = \"x\"").is_err());
    }
}
