use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pdf-reader";

/// Which renderer opens documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process MuPDF decoding
    Native,
    /// External Ghostscript run per page
    Subprocess,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "native") {
            BackendKind::Native
        } else {
            BackendKind::Subprocess
        }
    }
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Subprocess => "subprocess",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Ghostscript binary; the platform default install path when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghostscript_path: Option<PathBuf>,

    /// Extract page text in subprocess mode (one extra tool run per page)
    #[serde(default = "default_true")]
    pub extract_text: bool,

    #[serde(default = "default_native_workers")]
    pub native_workers: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Where per-render scratch directories are created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_native_workers() -> usize {
    2
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            ghostscript_path: None,
            extract_text: true,
            native_workers: default_native_workers(),
            tool_timeout_secs: None,
            scratch_dir: None,
        }
    }
}

impl RenderConfig {
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Load from the user config directory, falling back to defaults
    pub fn load() -> Self {
        match config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            Some(path) => {
                info!("Settings file not found at {path:?}, using defaults");
                Self::default()
            }
            None => {
                warn!("Could not determine config directory, using default settings");
                Self::default()
            }
        }
    }

    /// Load from `path`, falling back to defaults on any error
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match Self::from_yaml_str(&content) {
                Ok(settings) => {
                    debug!("Loaded settings from {path:?}");
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file {path:?}: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file {path:?}: {e}");
                Self::default()
            }
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = RenderConfig::from_yaml_str("{}").unwrap();
        assert_eq!(settings, RenderConfig::default());
        assert!(settings.extract_text);
        assert_eq!(settings.native_workers, 2);
        assert_eq!(settings.tool_timeout(), None);
    }

    #[test]
    fn parses_all_fields() {
        let yaml = r#"
backend: subprocess
ghostscript_path: /opt/gs/bin/gs
extract_text: false
native_workers: 4
tool_timeout_secs: 30
scratch_dir: /var/tmp/pdf
"#;
        let settings = RenderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(settings.backend, BackendKind::Subprocess);
        assert_eq!(settings.ghostscript_path, Some(PathBuf::from("/opt/gs/bin/gs")));
        assert!(!settings.extract_text);
        assert_eq!(settings.native_workers, 4);
        assert_eq!(settings.tool_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.scratch_dir, Some(PathBuf::from("/var/tmp/pdf")));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(RenderConfig::from_yaml_str("backend: pdfium").is_err());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "native_workers: [not, a, number]").unwrap();

        assert_eq!(RenderConfig::load_from_path(&path), RenderConfig::default());
        assert_eq!(
            RenderConfig::load_from_path(&dir.path().join("missing.yaml")),
            RenderConfig::default()
        );
    }

    #[test]
    fn backend_names_match_config_values() {
        for backend in [BackendKind::Native, BackendKind::Subprocess] {
            let yaml = format!("backend: {}", backend.as_str());
            assert_eq!(RenderConfig::from_yaml_str(&yaml).unwrap().backend, backend);
        }
    }

    #[test]
    fn round_trips_through_yaml() {
        let settings = RenderConfig {
            backend: BackendKind::Subprocess,
            tool_timeout_secs: Some(5),
            ..RenderConfig::default()
        };
        let yaml = serde_yaml::to_string(&settings).unwrap();
        assert!(!yaml.contains("ghostscript_path"));
        assert_eq!(RenderConfig::from_yaml_str(&yaml).unwrap(), settings);
    }
}
