//! Configuration loading and parsing

use anyhow::{Context, Result};
use obd_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
///
/// Every section is optional; command-line flags fill in or override values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Vehicle signal-set JSON
    pub signalset: Option<PathBuf>,
    /// Generic signal set layered underneath the vehicle signal set
    pub base_signalset: Option<PathBuf>,
    /// CAN dump files to decode
    #[serde(default)]
    pub dumps: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Write here instead of stdout
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl AppConfig {
    /// Resolve relative input and output paths against `base_dir`
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };

        self.input.signalset.iter_mut().for_each(resolve);
        self.input.base_signalset.iter_mut().for_each(resolve);
        self.input.dumps.iter_mut().for_each(resolve);
        self.output.path.iter_mut().for_each(resolve);
    }
}

/// Load configuration from a TOML file
///
/// Relative paths in the file are taken relative to the file's directory.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if let Some(base_dir) = path.parent() {
        config.resolve_paths(base_dir);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_decoder::CanIdFormat;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            signalset = "ford-f-150.json"
            base_signalset = "saej1979.json"
            dumps = ["odometer.txt", "tires.txt"]

            [decoder]
            can_id_format = "twenty_nine_bit"
            extended_addressing = true
            model_year = 2019

            [output]
            format = "text"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.signalset, Some(PathBuf::from("ford-f-150.json")));
        assert_eq!(config.input.dumps.len(), 2);
        assert_eq!(config.decoder.can_id_format, CanIdFormat::TwentyNineBit);
        assert!(config.decoder.extended_addressing);
        assert_eq!(config.decoder.model_year, Some(2019));
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.path.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.signalset.is_none());
        assert!(config.input.dumps.is_empty());
        assert_eq!(config.decoder, DecoderConfig::default());
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_load_config_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[input]\nsignalset = \"signals.json\"\ndumps = [\"/abs/dump.txt\"]\n\n[output]\npath = \"out.json\""
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.input.signalset, Some(dir.path().join("signals.json")));
        assert_eq!(config.input.dumps, vec![PathBuf::from("/abs/dump.txt")]);
        assert_eq!(config.output.path, Some(dir.path().join("out.json")));
    }

    #[test]
    fn test_load_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("missing.toml")).is_err());

        let path = dir.path().join("bad.toml");
        fs::write(&path, "[output]\nformat = \"html\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
