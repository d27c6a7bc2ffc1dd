use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "inkdeck";

/// Backend used for PDF and EPUB documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum PdfRenderMode {
    /// Embedded browser running a PDF viewer page
    Cef,
    /// Native rasterizer on a worker thread
    #[default]
    PyMuPdf,
    /// PDF rendering switched off
    None,
    /// Set after a failed backend probe; asks the user to check the config
    Retry,
    Other(String),
}

impl PdfRenderMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cef => "cef",
            Self::PyMuPdf => "pymupdf",
            Self::None => "none",
            Self::Retry => "retry",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for PdfRenderMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cef" => Self::Cef,
            "pymupdf" => Self::PyMuPdf,
            "none" => Self::None,
            "retry" => Self::Retry,
            _ => Self::Other(value),
        }
    }
}

impl From<PdfRenderMode> for String {
    fn from(value: PdfRenderMode) -> Self {
        value.as_str().to_string()
    }
}

/// Backend used for the ink overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum NotebookRenderMode {
    #[default]
    RmLinesSvgInker,
    Other(String),
}

impl NotebookRenderMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RmLinesSvgInker => "rm_lines_svg_inker",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for NotebookRenderMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rm_lines_svg_inker" => Self::RmLinesSvgInker,
            _ => Self::Other(value),
        }
    }
}

impl From<NotebookRenderMode> for String {
    fn from(value: NotebookRenderMode) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub pdf_render_mode: PdfRenderMode,

    #[serde(default)]
    pub notebook_render_mode: NotebookRenderMode,

    /// Write back the reading position and upload when a document closes
    #[serde(default = "default_true")]
    pub save_after_close: bool,

    #[serde(default)]
    pub debug: bool,

    /// Local mirror of the cloud library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_dir: Option<PathBuf>,

    /// Directory holding the embedded browser's bootstrap pages
    #[serde(default = "default_html_dir")]
    pub html_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_html_dir() -> PathBuf {
    PathBuf::from("assets/html")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            pdf_render_mode: PdfRenderMode::default(),
            notebook_render_mode: NotebookRenderMode::default(),
            save_after_close: true,
            debug: false,
            library_dir: None,
            html_dir: default_html_dir(),
        }
    }
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Library directory, falling back to the platform data dir
    pub fn resolved_library_dir(&self) -> Option<PathBuf> {
        self.library_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|data| data.join(APP_NAME).join("library")))
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match Settings::from_yaml(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = match settings.to_yaml() {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

// Public API for accessing/modifying settings

/// Copy of the current settings, handed to components at construction
pub fn snapshot() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}
