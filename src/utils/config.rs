use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Tunables for detection and completeness analysis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Trimmed content shorter than this is never considered a whole file.
    pub min_content_length: usize,
    /// Content longer than this may use the balanced-structure escape hatch.
    pub long_file_threshold: usize,
    /// How many leading bytes the format detector looks at.
    pub detection_window: usize,
    /// Allowed open/close brace difference for markup and script files.
    pub brace_tolerance: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            min_content_length: 50,
            long_file_threshold: 2000,
            detection_window: 4096,
            brace_tolerance: 1,
        }
    }
}

/// Extra well-known symbol appended to the built-in import table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SymbolOverride {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub type_only: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub output_directory: String,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "off".to_string(),
            output_directory: "./".to_string(),
            parser: ParserConfig::default(),
            symbols: Vec::new(),
        }
    }
}

pub fn get_config_path() -> Result<PathBuf, AppError> {
    let mut path = get_executable_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// Validate config to prevent obviously wrong or missing values.
pub fn validate_config(config: &Config) -> Result<(), AppError> {
    if !matches!(
        config.log_level.as_str(),
        "off" | "error" | "warn" | "info" | "debug"
    ) {
        return Err(AppError::InvalidInput(format!(
            "Unknown log level: {}",
            config.log_level
        )));
    }
    if config.parser.detection_window == 0 {
        return Err(AppError::InvalidInput(
            "Detection window cannot be zero".to_string(),
        ));
    }
    if config.parser.long_file_threshold < config.parser.min_content_length {
        return Err(AppError::InvalidInput(
            "Long file threshold must not be below the minimum content length".to_string(),
        ));
    }
    if let Some(symbol) = config
        .symbols
        .iter()
        .find(|s| s.name.trim().is_empty() || s.module.trim().is_empty())
    {
        return Err(AppError::InvalidInput(format!(
            "Symbol override needs both a name and a module: {:?}",
            symbol
        )));
    }
    Ok(())
}

/// Read config from `path` (or the default location), creating a default config if none exists.
pub fn read_config(path: Option<&Path>) -> Result<Config, AppError> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };
    if !config_path.exists() {
        log::debug!("No config at {}, writing defaults", config_path.display());
        write_config_to(&Config::default(), &config_path)?;
    }
    let config_str = fs::read_to_string(&config_path)?;
    let config: Config = toml::from_str(&config_str)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn write_config(config: &Config, path: Option<&Path>) -> Result<(), AppError> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };
    write_config_to(config, &config_path)
}

fn write_config_to(config: &Config, config_path: &Path) -> Result<(), AppError> {
    let config_str = toml::to_string(config)?;
    fs::write(config_path, config_str)?;
    Ok(())
}

fn get_executable_dir() -> Result<PathBuf, AppError> {
    let exe = env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Executable has no parent directory: {}",
            exe.display()
        ))
    })
}
