use std::path::PathBuf;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Snapshot directory for the in-memory store.
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub enable_hsts: bool,
    /// Restricts CORS to this origin; any origin when unset.
    pub frontend_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            data_dir: PathBuf::from("data"),
            database_url: None,
            db_max_connections: 5,
            enable_hsts: false,
            frontend_url: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Malformed numbers fall back to the defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let non_empty = |name: &str| get(name).filter(|v| !v.trim().is_empty());
        Self {
            host: non_empty("HOST").unwrap_or(d.host),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(d.port),
            data_dir: non_empty("BOARD_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: non_empty("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.db_max_connections),
            enable_hsts: non_empty("ENABLE_HSTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(d.enable_hsts),
            frontend_url: non_empty("FRONTEND_URL"),
        }
    }

    /// Checks the selected store backend has what it needs.
    pub fn validate(&self) -> Result<(), String> {
        if cfg!(feature = "postgres-store") && self.database_url.is_none() {
            return Err("DATABASE_URL must be set for postgres-store".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let s = Settings::from_lookup(lookup(&[]));
        assert_eq!(s.port, 3000);
        assert_eq!(s.host, "0.0.0.0");
        assert!(s.database_url.is_none());
        assert!(!s.enable_hsts);
    }

    #[test]
    fn reads_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("BOARD_DATA_DIR", "/tmp/boards"),
            ("ENABLE_HSTS", "TRUE"),
            ("FRONTEND_URL", "https://boards.example"),
        ]));
        assert_eq!(s.port, 8080);
        assert_eq!(s.data_dir, PathBuf::from("/tmp/boards"));
        assert!(s.enable_hsts);
        assert_eq!(s.frontend_url.as_deref(), Some("https://boards.example"));
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let s = Settings::from_lookup(lookup(&[("PORT", "eighty"), ("DB_MAX_CONNECTIONS", "-1")]));
        assert_eq!(s.port, 3000);
        assert_eq!(s.db_max_connections, 5);
    }
}
