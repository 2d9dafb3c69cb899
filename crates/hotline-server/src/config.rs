//! Server configuration and config-directory layout.
//!
//! One YAML file, `config.yaml`, inside the config directory. Every field
//! has a default so a minimal file (or none at all, via `--init`) is
//! enough to boot a server.

use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server name, shown in trackers and login replies
    #[serde(default = "default_name")]
    pub name: String,

    /// One-line description for tracker listings
    #[serde(default = "default_description")]
    pub description: String,

    /// Control-port listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Transfer-port listen address
    #[serde(default = "default_transfer_listen")]
    pub transfer_listen: String,

    /// Directory of served files, relative to the config dir unless
    /// absolute
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,

    /// Trackers to announce to (host:port)
    #[serde(default)]
    pub trackers: Vec<String>,

    /// Seconds between tracker announcements
    #[serde(default = "default_tracker_interval")]
    pub tracker_interval_secs: u64,

    /// Keep client-supplied info and resource forks on upload
    #[serde(default = "default_true")]
    pub preserve_forks: bool,

    /// Banner id sent in the login reply
    #[serde(default)]
    pub banner_id: u16,

    /// Maximum simultaneous file transfers
    #[serde(default = "default_max_transfers")]
    pub max_transfers: usize,
}

fn default_name() -> String {
    "Hotline Server".to_string()
}

fn default_description() -> String {
    "A Hotline server".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:5500".to_string()
}

fn default_transfer_listen() -> String {
    "0.0.0.0:5501".to_string()
}

fn default_files_root() -> PathBuf {
    PathBuf::from("Files")
}

fn default_tracker_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_max_transfers() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            listen: default_listen(),
            transfer_listen: default_transfer_listen(),
            files_root: default_files_root(),
            trackers: Vec::new(),
            tracker_interval_secs: default_tracker_interval(),
            preserve_forks: true,
            banner_id: 0,
            max_transfers: default_max_transfers(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns a config error when the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.as_ref().display())))?;
        serde_yaml::from_str(&contents).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ServerError> {
        let contents =
            serde_yaml::to_string(self).map_err(|e| ServerError::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Parse the control listen address
    ///
    /// # Errors
    ///
    /// Config error on an unparsable address.
    pub fn parse_listen(&self) -> Result<SocketAddr, ServerError> {
        self.listen
            .parse()
            .map_err(|e| ServerError::Config(format!("listen address: {e}")))
    }

    /// Parse the transfer listen address
    ///
    /// # Errors
    ///
    /// Config error on an unparsable address.
    pub fn parse_transfer_listen(&self) -> Result<SocketAddr, ServerError> {
        self.transfer_listen
            .parse()
            .map_err(|e| ServerError::Config(format!("transfer listen address: {e}")))
    }

    /// Validate field values
    ///
    /// # Errors
    ///
    /// Config error describing the first rejected field.
    pub fn validate(&self) -> Result<(), ServerError> {
        self.parse_listen()?;
        self.parse_transfer_listen()?;

        if self.name.is_empty() || self.name.len() > 255 {
            return Err(ServerError::Config(
                "server name must be 1-255 bytes".to_string(),
            ));
        }
        if self.description.len() > 255 {
            return Err(ServerError::Config(
                "description must be at most 255 bytes".to_string(),
            ));
        }
        if self.tracker_interval_secs == 0 {
            return Err(ServerError::Config(
                "tracker interval must be nonzero".to_string(),
            ));
        }
        for tracker in &self.trackers {
            if !tracker.contains(':') {
                return Err(ServerError::Config(format!(
                    "tracker '{tracker}' missing port (expected host:port)"
                )));
            }
        }
        if self.max_transfers == 0 {
            return Err(ServerError::Config(
                "max transfers must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Well-known file locations inside the config directory
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// The configuration directory itself
    pub config_dir: PathBuf,
}

impl ConfigPaths {
    /// Paths rooted at `config_dir`
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// `config.yaml`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }

    /// `MessageBoard.txt`
    #[must_use]
    pub fn message_board(&self) -> PathBuf {
        self.config_dir.join("MessageBoard.txt")
    }

    /// `Agreement.txt`
    #[must_use]
    pub fn agreement(&self) -> PathBuf {
        self.config_dir.join("Agreement.txt")
    }

    /// `ThreadedNews.yaml`
    #[must_use]
    pub fn news(&self) -> PathBuf {
        self.config_dir.join("ThreadedNews.yaml")
    }

    /// `Users/`
    #[must_use]
    pub fn users_dir(&self) -> PathBuf {
        self.config_dir.join("Users")
    }

    /// `banner.jpg`
    #[must_use]
    pub fn banner(&self) -> PathBuf {
        self.config_dir.join("banner.jpg")
    }

    /// Resolve the files root from the config (absolute, or relative to
    /// the config dir)
    #[must_use]
    pub fn files_root(&self, config: &Config) -> PathBuf {
        if config.files_root.is_absolute() {
            config.files_root.clone()
        } else {
            self.config_dir.join(&config.files_root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parse_listen().unwrap().port(), 5500);
        assert_eq!(config.parse_transfer_listen().unwrap().port(), 5501);
    }

    #[test]
    fn test_minimal_yaml_gets_defaults() {
        let config: Config = serde_yaml::from_str("name: My Server\n").unwrap();
        assert_eq!(config.name, "My Server");
        assert_eq!(config.listen, "0.0.0.0:5500");
        assert!(config.preserve_forks);
    }

    #[test]
    fn test_bad_listen_rejected() {
        let mut config = Config::default();
        config.listen = "not an address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tracker_without_port_rejected() {
        let mut config = Config::default();
        config.trackers = vec!["tracker.example.com".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.listen, config.listen);
        assert_eq!(back.files_root, config.files_root);
    }

    #[test]
    fn test_paths_layout() {
        let paths = ConfigPaths::new("/srv/hotline");
        assert!(paths.news().ends_with("ThreadedNews.yaml"));
        assert!(paths.users_dir().ends_with("Users"));

        let config = Config::default();
        assert_eq!(
            paths.files_root(&config),
            PathBuf::from("/srv/hotline/Files")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.name = "Saved".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.name, "Saved");
    }
}
