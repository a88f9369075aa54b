use crate::error::ExportError;
use crate::locale::{parse_locale_groups, LocaleGroup};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Job-step parameters as the scheduler passes them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobParameters {
    pub export_file_name: Option<String>,
    pub is_disabled: bool,
}

impl JobParameters {
    pub fn new(export_file_name: impl Into<String>) -> Self {
        Self { export_file_name: Some(export_file_name.into()), is_disabled: false }
    }

    pub fn disabled(mut self, yes: bool) -> Self {
        self.is_disabled = yes;
        self
    }

    /// The mandatory `ExportFileName`, trimmed.
    pub fn require_export_file_name(&self) -> Result<&str, ExportError> {
        match self.export_file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ExportError::config(format!(
                "One or more mandatory parameters are missing. Export File Name = ({})",
                self.export_file_name.as_deref().unwrap_or("null")
            ))),
        }
    }
}

/// Storefront location used to build absolute product and category links.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Storefront {
    pub scheme: String,
    pub host: String,
}

impl Default for Storefront {
    fn default() -> Self {
        Self { scheme: "https".into(), host: "localhost".into() }
    }
}

/// Site-level configuration and custom preferences.
/// Aliases accept the preference ids used by the platform's site export.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SitePreferences {
    pub site_id: String,
    pub default_locale: String,
    pub allowed_locales: Vec<String>,
    #[serde(alias = "turntoUseVariants")]
    pub use_variants: bool,
    #[serde(alias = "turntoHistoricalOrderDays")]
    pub historical_order_days: Option<u32>,
    #[serde(alias = "turntoHistoricalOrderDate")]
    pub historical_order_date: Option<String>,
    /// Site key -> `{ "locales": "en_US,fr_CA", "authKey": "..", "domain": ".." }`,
    /// either as a JSON object or as the JSON text the preference stores.
    #[serde(alias = "TurnToSiteAuthKeyJSON")]
    pub site_auth_keys: Option<Value>,
    #[serde(alias = "defaultDataCenterUrl")]
    pub default_data_center_url: Option<String>,
    pub storefront: Storefront,
}

impl Default for SitePreferences {
    fn default() -> Self {
        Self {
            site_id: "default".into(),
            default_locale: "default".into(),
            allowed_locales: Vec::new(),
            use_variants: false,
            historical_order_days: None,
            historical_order_date: None,
            site_auth_keys: None,
            default_data_center_url: None,
            storefront: Storefront::default(),
        }
    }
}

impl SitePreferences {
    /// Load preferences from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open site config {}", path.display()))?;
        let prefs: SitePreferences = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse site config {}", path.display()))?;
        Ok(prefs)
    }

    /// Parsed locale/credential groups, in site-key order.
    pub fn locale_groups(&self) -> Result<Vec<LocaleGroup>, ExportError> {
        match &self.site_auth_keys {
            None | Some(Value::Null) => Err(ExportError::config(
                "Mandatory site preference \"TurnToSiteAuthKeyJSON\" is missing",
            )),
            Some(Value::String(text)) => parse_locale_groups(text),
            Some(obj @ Value::Object(_)) => parse_locale_groups(&obj.to_string()),
            Some(other) => Err(ExportError::config(format!(
                "TurnToSiteAuthKeyJSON must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn with_site_auth_keys(mut self, json: impl Into<String>) -> Self {
        self.site_auth_keys = Some(Value::String(json.into()));
        self
    }
}

/// Run options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Root of the import/export area; feeds land under `<root>/TurnTo/`.
    pub export_root: PathBuf,
    /// Processed entities buffered before a write cycle.
    pub chunk_size: usize,
    pub progress: bool,
    pub progress_label: Option<String>,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_root: PathBuf::from("./impex"),
            chunk_size: 100,
            progress: true,
            progress_label: None,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ExportOptions {
    pub fn with_export_root(mut self, root: impl AsRef<Path>) -> Self {
        self.export_root = root.as_ref().to_path_buf();
        self
    }
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }
}
