use crate::classify::{Classifier, DEFAULT_PRIMARY_EXTENSIONS, DEFAULT_SIDECAR_EXTENSIONS};
use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: Option<PathBuf>,
    pub dest: Option<PathBuf>,
    pub verbose: bool,
    pub dry_run: bool,
    pub primary_extensions: Vec<String>,
    pub sidecar_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub time_tolerance_secs: u64,
    pub jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: None,
            dest: None,
            verbose: false,
            dry_run: false,
            primary_extensions: DEFAULT_PRIMARY_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            sidecar_extensions: DEFAULT_SIDECAR_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_patterns: Vec::new(),
            time_tolerance_secs: 5,
            jobs: 1,
        }
    }
}

/// Load configuration from an optional `Archiver.{toml,yaml,json}` in the
/// working directory, then `extra_file` if given, then `ARCHIVER_*`
/// environment variables. Later sources win.
pub fn load_configuration(extra_file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(ConfigFile::with_name("Archiver").required(false));
    if let Some(path) = extra_file {
        builder = builder.add_source(ConfigFile::from(path).required(true));
    }
    builder
        .add_source(
            Environment::with_prefix("ARCHIVER")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("primary_extensions")
                .with_list_parse_key("sidecar_extensions")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?
        .try_deserialize::<AppConfig>()
}

impl AppConfig {
    /// Check everything that must hold before a scan starts.
    pub fn validate(&self) -> Result<(), Error> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::Config("no source directory given".to_string()))?;
        let dest = self
            .dest
            .as_ref()
            .ok_or_else(|| Error::Config("no destination directory given".to_string()))?;

        if source == dest {
            return Err(Error::Config(format!(
                "source and destination are the same directory: {}",
                source.display()
            )));
        }
        if self.jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }
        self.classifier()?;
        Ok(())
    }

    pub fn classifier(&self) -> Result<Classifier, Error> {
        Classifier::new(&self.primary_extensions, &self.sidecar_extensions)
    }

    pub fn time_tolerance(&self) -> Duration {
        Duration::from_secs(self.time_tolerance_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn configured() -> AppConfig {
        AppConfig {
            source: Some(PathBuf::from("/media/card")),
            dest: Some(PathBuf::from("/archive")),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(configured().validate().is_ok());
        assert_eq!(configured().time_tolerance(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_paths_rejected() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = AppConfig {
            dest: None,
            ..configured()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_same_source_and_dest_rejected() {
        let config = AppConfig {
            dest: Some(PathBuf::from("/media/card")),
            ..configured()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_overlapping_extensions_rejected() {
        let config = AppConfig {
            sidecar_extensions: vec!["thm".to_string(), "JPG".to_string()],
            ..configured()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let config = AppConfig {
            jobs: 0,
            ..configured()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("archiver.toml");
        fs::write(
            &path,
            r#"
source = "/media/card"
dest = "/archive"
primary_extensions = ["jpg", "mov"]
time_tolerance_secs = 2
jobs = 4
"#,
        )
        .unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert_eq!(config.source, Some(PathBuf::from("/media/card")));
        assert_eq!(config.primary_extensions, vec!["jpg", "mov"]);
        assert_eq!(config.sidecar_extensions, vec!["thm", "xmp"]);
        assert_eq!(config.time_tolerance_secs, 2);
        assert_eq!(config.jobs, 4);
        assert!(!config.dry_run);
    }
}
