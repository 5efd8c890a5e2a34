//! `gcam.toml` settings.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gcam_kernel_cam::{LineEnding, SynthOptions};
use gcam_stocksim::SimSettings;
use serde::{Deserialize, Serialize};

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "gcam.toml";

/// Program output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Newline sequence; the platform's when unset.
    pub line_ending: LineEnding,
    /// Overrides the machine's decimal places.
    pub decimals: Option<usize>,
}

impl OutputConfig {
    /// Options for [`gcam_kernel_cam::generate`].
    pub fn synth_options(&self) -> SynthOptions {
        SynthOptions {
            line_ending: self.line_ending,
            decimals: self.decimals,
        }
    }
}

/// Everything `gcam.toml` can set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// `[output]` section.
    pub output: OutputConfig,
    /// `[simulation]` section.
    pub simulation: SimSettings,
}

impl CliConfig {
    /// Read `path`, or `gcam.toml` if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
            None => return Ok(Self::default()),
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse TOML text; missing keys take their defaults.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(CliConfig::parse("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_line_ending_defaults_to_platform() {
        let config = CliConfig::parse("[output]\ndecimals = 2\n").unwrap();
        assert_eq!(config.output.line_ending, LineEnding::native());
        let config = CliConfig::parse("[output]\nline_ending = \"lf\"\n").unwrap();
        assert_eq!(config.output.synth_options().line_ending, LineEnding::Lf);
    }

    #[test]
    fn test_sections() {
        let config = CliConfig::parse(
            r#"
            [output]
            line_ending = "crlf"
            decimals = 3

            [simulation]
            resolution = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.output.line_ending, LineEnding::Crlf);
        assert_eq!(config.output.synth_options().decimals, Some(3));
        assert_eq!(config.simulation.resolution, Some(128));
        assert!(config.simulation.reset);
    }

    #[test]
    fn test_unknown_line_ending_is_an_error() {
        assert!(CliConfig::parse("[output]\nline_ending = \"cr\"\n").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\ntool_diameter = 0.5").unwrap();
        let config = CliConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.simulation.tool_diameter, 0.5);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
