use crate::constants;
use crate::error::{EtlError, Result};
use crate::transform::DedupPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub store: StoreConfig,
    pub sources: Vec<SourceConfig>,
    pub transform: TransformConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

/// One regional export and the label stamped onto its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub dedup: DedupPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            sources: constants::default_sources()
                .into_iter()
                .map(|(path, region)| SourceConfig {
                    path: PathBuf::from(path),
                    region: region.to_string(),
                })
                .collect(),
            transform: TransformConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_STORE_PATH),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl SourceConfig {
    /// Parse a `PATH=REGION` command line argument.
    pub fn parse_arg(arg: &str) -> Result<Self> {
        match arg.rsplit_once('=') {
            Some((path, region)) if !path.trim().is_empty() && !region.trim().is_empty() => {
                Ok(Self {
                    path: PathBuf::from(path.trim()),
                    region: region.trim().to_string(),
                })
            }
            _ => Err(EtlError::Config(format!(
                "invalid source '{}', expected PATH=REGION",
                arg
            ))),
        }
    }
}

impl EtlConfig {
    /// Load configuration from `path`, or from `sales_etl.toml` when `path`
    /// is `None`. Sources are not validated here since the command line may
    /// still replace them; call [`EtlConfig::validate`] once overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Path::new(constants::DEFAULT_CONFIG_PATH))
    }

    /// A missing `default_path` yields the built-in defaults; a missing
    /// explicitly named file is an error.
    pub fn load_from(path: Option<&Path>, default_path: &Path) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None if default_path.exists() => Self::from_file(default_path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EtlConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Store path from `SALES_ETL_DB`, ignoring blank values.
    pub fn store_path_from_env() -> Option<PathBuf> {
        std::env::var(constants::STORE_PATH_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| PathBuf::from(v.trim()))
    }

    /// Apply store overrides; the command line wins over the environment,
    /// which wins over the file.
    pub fn apply_store_overrides(&mut self, env_path: Option<PathBuf>, cli_path: Option<PathBuf>) {
        if let Some(path) = cli_path.or(env_path) {
            self.store.path = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EtlError::Config("no order sources configured".to_string()));
        }
        if let Some(source) = self.sources.iter().find(|s| s.region.trim().is_empty()) {
            return Err(EtlError::Config(format!(
                "source '{}' has an empty region label",
                source.path.display()
            )));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(EtlError::Config("store path is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_use_two_regions() {
        let config = EtlConfig::default();
        assert_eq!(config.store.path, PathBuf::from("sales_data.db"));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].region, "A");
        assert_eq!(config.sources[1].region, "B");
        assert_eq!(config.transform.dedup, DedupPolicy::FirstSeen);
    }

    #[test]
    fn test_parse_toml() {
        let config = EtlConfig::from_toml_str(
            r#"
            [store]
            path = "out/sales.db"

            [[sources]]
            path = "east.csv"
            region = "EAST"

            [transform]
            dedup = "first_seen"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, PathBuf::from("out/sales.db"));
        assert_eq!(
            config.sources,
            vec![SourceConfig {
                path: PathBuf::from("east.csv"),
                region: "EAST".to_string()
            }]
        );
        assert_eq!(config.logging.directory, PathBuf::from("logs"));
    }

    #[test]
    fn test_unknown_dedup_policy_is_rejected() {
        let err = EtlConfig::from_toml_str("[transform]\ndedup = \"highest_net_sale\"\n").unwrap_err();
        assert!(matches!(err, EtlError::Toml(_)));
    }

    #[test]
    fn test_empty_sources_fail_validation() {
        let config = EtlConfig::from_toml_str("sources = []\n").unwrap();
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let err = EtlConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_load_does_not_require_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales_etl.toml");
        fs::write(&path, "sources = []\n").unwrap();

        let mut config = EtlConfig::load(Some(path.as_path())).unwrap();
        assert!(config.validate().is_err());

        config.sources = vec![SourceConfig::parse_arg("a.csv=A").unwrap()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_default_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = EtlConfig::load_from(None, &dir.path().join("sales_etl.toml")).unwrap();
        assert_eq!(config, EtlConfig::default());
    }

    #[test]
    fn test_default_file_is_read_when_present() {
        let dir = tempdir().unwrap();
        let default_path = dir.path().join("sales_etl.toml");
        fs::write(&default_path, "[store]\npath = \"from_file.db\"\n").unwrap();

        let config = EtlConfig::load_from(None, &default_path).unwrap();

        assert_eq!(config.store.path, PathBuf::from("from_file.db"));
        assert_eq!(config.sources, EtlConfig::default().sources);
    }

    #[test]
    fn test_store_override_precedence() {
        let file = || EtlConfig::from_toml_str("[store]\npath = \"file.db\"\n").unwrap();

        let mut config = file();
        config.apply_store_overrides(None, None);
        assert_eq!(config.store.path, PathBuf::from("file.db"));

        let mut config = file();
        config.apply_store_overrides(Some("env.db".into()), None);
        assert_eq!(config.store.path, PathBuf::from("env.db"));

        let mut config = file();
        config.apply_store_overrides(Some("env.db".into()), Some("cli.db".into()));
        assert_eq!(config.store.path, PathBuf::from("cli.db"));

        let mut config = EtlConfig::default();
        config.apply_store_overrides(None, None);
        assert_eq!(config.store.path, PathBuf::from("sales_data.db"));
    }

    #[test]
    fn test_store_path_from_env() {
        // Only test touching SALES_ETL_DB.
        std::env::set_var(constants::STORE_PATH_ENV, " env/sales.db ");
        let from_env = EtlConfig::store_path_from_env();
        std::env::set_var(constants::STORE_PATH_ENV, "   ");
        let blank = EtlConfig::store_path_from_env();
        std::env::remove_var(constants::STORE_PATH_ENV);

        assert_eq!(from_env, Some(PathBuf::from("env/sales.db")));
        assert_eq!(blank, None);
        assert_eq!(EtlConfig::store_path_from_env(), None);
    }

    #[test]
    fn test_parse_source_arg() {
        let source = SourceConfig::parse_arg("data/west.csv=W").unwrap();
        assert_eq!(source.path, PathBuf::from("data/west.csv"));
        assert_eq!(source.region, "W");

        assert!(SourceConfig::parse_arg("data/west.csv").is_err());
        assert!(SourceConfig::parse_arg("=W").is_err());
        assert!(SourceConfig::parse_arg("data/west.csv=").is_err());
    }
}
