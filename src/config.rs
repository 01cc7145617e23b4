use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Number of background rebuild workers.
    pub rebuild_workers: usize,
    /// Optional pepper for API-key hash derivation in deployments that use keys.
    pub api_key_pepper: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let rebuild_workers = env_map
            .get("REBUILD_WORKERS")
            .map(|s| s.as_str())
            .unwrap_or("2")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "REBUILD_WORKERS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;
        if rebuild_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "REBUILD_WORKERS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let api_key_pepper = env_map.get("API_KEY_PEPPER").cloned();

        Ok(Config {
            port,
            database_path,
            rebuild_workers,
            api_key_pepper,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rebuild_workers, 2);
        assert!(config.api_key_pepper.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("REBUILD_WORKERS".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "REBUILD_WORKERS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_pepper_passthrough() {
        let mut env_map = setup_required_env();
        env_map.insert("API_KEY_PEPPER".to_string(), "s3cret".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.api_key_pepper.as_deref(), Some("s3cret"));
    }
}
