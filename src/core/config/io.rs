use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Config`].
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to serialize or atomically replace the configuration file.
    Write {
        path: PathBuf,
        source: Box<dyn StdError>,
    },

    /// The platform reported no home/config directory.
    NoConfigDir,

    UnknownKey(String),

    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path_display(path), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path_display(path), source)
            }
            ConfigError::Write { path, source } => {
                write!(f, "Failed to write config at {}: {}", path_display(path), source)
            }
            ConfigError::NoConfigDir => f.write_str("Could not determine config directory"),
            ConfigError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {key}: '{value}'")
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::config_path()?)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        self.write_atomically(config_path)
            .map_err(|source| ConfigError::Write {
                path: config_path.to_path_buf(),
                source,
            })
    }

    fn write_atomically(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };

        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(config_path)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("org", "repcoach", "repcoach").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}
