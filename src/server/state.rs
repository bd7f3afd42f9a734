//! Server settings and shared handler state.

use crate::error::{OcrError, OcrResult};
use crate::pipeline::rasterize::RasterizerConfig;
use crate::render::{PdfBackendKind, PdfRenderOptions};
use crate::vision::{AnthropicConfig, AnthropicVision, VisionModel};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 200;

/// Everything the server reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    pub rasterizer: RasterizerConfig,
    pub pdf: PdfRenderOptions,
    /// Used when a request leaves the key field empty.
    pub default_api_key: Option<String>,
    /// Model id override for the Anthropic client.
    pub model: Option<String>,
    pub inter_page_delay: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            rasterizer: RasterizerConfig::default(),
            pdf: PdfRenderOptions::default(),
            default_api_key: None,
            model: None,
            inter_page_delay: Duration::from_secs(1),
        }
    }
}

impl ServerSettings {
    /// Read `OCR_HOST`, `OCR_PORT`, `OCR_MAX_UPLOAD_MB`, `OCR_PDF_BACKEND`,
    /// `OCR_PDF_FONT`, `OCR_MODEL`, `OCR_WORK_DIR`, `POPPLER_PATH` and
    /// `ANTHROPIC_API_KEY`.
    pub fn from_env() -> OcrResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OcrResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut s = Self::default();

        if let Some(host) = get("OCR_HOST") {
            s.host = host;
        }
        if let Some(port) = get("OCR_PORT") {
            s.port = port.parse().map_err(|_| {
                OcrError::InvalidConfig(format!("OCR_PORT must be a port number, got '{port}'"))
            })?;
        }
        if let Some(mb) = get("OCR_MAX_UPLOAD_MB") {
            let mb: usize = mb.parse().map_err(|_| {
                OcrError::InvalidConfig(format!("OCR_MAX_UPLOAD_MB must be a number, got '{mb}'"))
            })?;
            s.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(backend) = get("OCR_PDF_BACKEND") {
            s.pdf.backend = match backend.to_ascii_lowercase().as_str() {
                "simple" => PdfBackendKind::Simple,
                "flow" => PdfBackendKind::Flow,
                other => {
                    return Err(OcrError::InvalidConfig(format!(
                        "OCR_PDF_BACKEND must be simple or flow, got '{other}'"
                    )))
                }
            };
        }
        s.pdf.font_path = get("OCR_PDF_FONT").map(PathBuf::from);
        s.rasterizer.poppler_dir = get("POPPLER_PATH").map(PathBuf::from);
        s.rasterizer.work_root = get("OCR_WORK_DIR").map(PathBuf::from);
        s.default_api_key = get("ANTHROPIC_API_KEY");
        s.model = get("OCR_MODEL");
        Ok(s)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builds a vision model for the key a request carries.
pub trait ModelFactory: Send + Sync {
    fn for_key(&self, api_key: &str) -> OcrResult<Arc<dyn VisionModel>>;
}

/// [`ModelFactory`] for the Anthropic Messages API.
#[derive(Debug, Clone, Default)]
pub struct AnthropicFactory {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl ModelFactory for AnthropicFactory {
    fn for_key(&self, api_key: &str) -> OcrResult<Arc<dyn VisionModel>> {
        let mut config = AnthropicConfig::new(api_key);
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url);
        }
        Ok(Arc::new(AnthropicVision::new(config)?))
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServerSettings>,
    pub models: Arc<dyn ModelFactory>,
}

impl AppState {
    /// State that talks to Anthropic with the configured model.
    pub fn new(settings: ServerSettings) -> Self {
        let models = AnthropicFactory {
            model: settings.model.clone(),
            base_url: None,
        };
        Self::with_models(settings, Arc::new(models))
    }

    pub fn with_models(settings: ServerSettings, models: Arc<dyn ModelFactory>) -> Self {
        Self {
            settings: Arc::new(settings),
            models,
        }
    }

    /// The request's key, else the server default.
    pub fn resolve_key(&self, submitted: Option<&str>) -> Option<String> {
        submitted
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| self.settings.default_api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let s = ServerSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.bind_addr(), "127.0.0.1:8080");
        assert_eq!(s.max_upload_bytes, 200 * 1024 * 1024);
        assert!(s.default_api_key.is_none());
        assert_eq!(s.pdf.backend, PdfBackendKind::Flow);
    }

    #[test]
    fn environment_overrides() {
        let s = ServerSettings::from_lookup(lookup(&[
            ("OCR_HOST", "0.0.0.0"),
            ("OCR_PORT", "9000"),
            ("OCR_MAX_UPLOAD_MB", "5"),
            ("OCR_PDF_BACKEND", "simple"),
            ("POPPLER_PATH", "/opt/poppler/bin"),
            ("ANTHROPIC_API_KEY", " sk-test "),
        ]))
        .unwrap();
        assert_eq!(s.bind_addr(), "0.0.0.0:9000");
        assert_eq!(s.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(s.pdf.backend, PdfBackendKind::Simple);
        assert_eq!(
            s.rasterizer.poppler_dir.as_deref(),
            Some(std::path::Path::new("/opt/poppler/bin"))
        );
        assert_eq!(s.default_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let err = ServerSettings::from_lookup(lookup(&[("OCR_PORT", "http")])).unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn submitted_key_wins_over_default() {
        let settings = ServerSettings {
            default_api_key: Some("server-key".into()),
            ..ServerSettings::default()
        };
        let state = AppState::new(settings);
        assert_eq!(state.resolve_key(Some("user-key")).as_deref(), Some("user-key"));
        assert_eq!(state.resolve_key(Some("  ")).as_deref(), Some("server-key"));
        assert_eq!(state.resolve_key(None).as_deref(), Some("server-key"));
    }

    #[test]
    fn anthropic_factory_rejects_blank_key() {
        assert!(AnthropicFactory::default().for_key(" ").is_err());
        assert!(AnthropicFactory::default().for_key("sk-test").is_ok());
    }
}
