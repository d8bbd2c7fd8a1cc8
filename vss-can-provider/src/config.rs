//! Configuration loading and merging with command-line overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from provider.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// DBC file describing the CAN frames
    pub dbc_file: Option<PathBuf>,
    /// JSON mapping from VSS paths to DBC signals
    pub mapping_file: Option<PathBuf>,
    /// JSON-lines file with update batches (stdin when absent)
    pub updates: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// CAN interface name written into the frame log
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Frame log file (stdout when absent)
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            file: None,
        }
    }
}

fn default_interface() -> String {
    "vcan0".to_string()
}

/// Values given on the command line; each one wins over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dbc_file: Option<PathBuf>,
    pub mapping_file: Option<PathBuf>,
    pub updates: Option<PathBuf>,
    pub interface: Option<String>,
    pub output: Option<PathBuf>,
}

/// Fully resolved settings the provider runs with
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub dbc_file: PathBuf,
    pub mapping_file: PathBuf,
    pub updates: Option<PathBuf>,
    pub interface: String,
    pub output: Option<PathBuf>,
}

impl AppConfig {
    /// Apply command-line overrides and check that required inputs are set
    pub fn resolve(self, overrides: Overrides) -> Result<Settings> {
        let dbc_file = overrides
            .dbc_file
            .or(self.input.dbc_file)
            .context("No DBC file given (use --dbc or input.dbc_file)")?;
        let mapping_file = overrides
            .mapping_file
            .or(self.input.mapping_file)
            .context("No mapping file given (use --mapping or input.mapping_file)")?;

        Ok(Settings {
            dbc_file,
            mapping_file,
            updates: overrides.updates.or(self.input.updates),
            interface: overrides.interface.unwrap_or(self.output.interface),
            output: overrides.output.or(self.output.file),
        })
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            dbc_file = "Model3CAN.dbc"
            mapping_file = "mapping/vss_dbc.json"

            [output]
            file = "frames.log"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.dbc_file, Some(PathBuf::from("Model3CAN.dbc")));
        assert_eq!(config.input.updates, None);
        assert_eq!(config.output.interface, "vcan0");

        let settings = config.resolve(Overrides::default()).unwrap();
        assert_eq!(settings.mapping_file, PathBuf::from("mapping/vss_dbc.json"));
        assert_eq!(settings.output, Some(PathBuf::from("frames.log")));
    }

    #[test]
    fn test_overrides_win() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            dbc_file = "a.dbc"
            mapping_file = "a.json"
            [output]
            interface = "can0"
        "#,
        )
        .unwrap();

        let settings = config
            .resolve(Overrides {
                dbc_file: Some(PathBuf::from("b.dbc")),
                interface: Some("vcan1".to_string()),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(settings.dbc_file, PathBuf::from("b.dbc"));
        assert_eq!(settings.mapping_file, PathBuf::from("a.json"));
        assert_eq!(settings.interface, "vcan1");
    }

    #[test]
    fn test_missing_inputs_are_errors() {
        let result = AppConfig::default().resolve(Overrides {
            mapping_file: Some(PathBuf::from("a.json")),
            ..Overrides::default()
        });
        assert!(result.is_err());

        let result = AppConfig::default().resolve(Overrides {
            dbc_file: Some(PathBuf::from("a.dbc")),
            ..Overrides::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[input]\ndbc_file = \"x.dbc\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.input.dbc_file, Some(PathBuf::from("x.dbc")));

        assert!(load_config(Path::new("/nonexistent/provider.toml")).is_err());
    }
}
