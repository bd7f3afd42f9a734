//! Request handlers.

use crate::config::{DocumentProfile, OcrConfig, OutputFormat};
use crate::convert::{output_filename, run, RunContext};
use crate::output::ConversionOutput;
use crate::pipeline::rasterize::Rasterizer;
use crate::progress::LogProgress;
use crate::server::error::{ApiError, ApiResult};
use crate::server::page::index_html;
use crate::server::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

// ── Pages ────────────────────────────────────────────────────────────────

/// GET /
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(index_html(state.settings.max_upload_bytes / (1024 * 1024)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ── Form parsing ─────────────────────────────────────────────────────────

/// An uploaded file.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// Raw fields of the upload form. Unknown fields are ignored; a repeated
/// field keeps its last value.
#[derive(Debug, Default)]
pub struct OcrForm {
    pub file: Option<Upload>,
    pub api_key: Option<String>,
    pub profile: Option<String>,
    pub format: Option<String>,
    pub dpi: Option<String>,
    pub page_numbers: Option<String>,
}

impl OcrForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = OcrForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    debug!("Received upload '{}' ({} bytes)", file_name, data.len());
                    form.file = Some(Upload { file_name, data });
                }
                "api_key" => form.api_key = Some(field.text().await?),
                "profile" => form.profile = Some(field.text().await?),
                "format" => form.format = Some(field.text().await?),
                "dpi" => form.dpi = Some(field.text().await?),
                "page_numbers" => form.page_numbers = Some(field.text().await?),
                other => debug!("Ignoring form field '{}'", other),
            }
        }
        Ok(form)
    }

    /// Run configuration from the form fields. Missing fields take the
    /// defaults.
    pub fn to_config(&self, state: &AppState) -> ApiResult<OcrConfig> {
        let mut builder = OcrConfig::builder()
            .inter_page_delay(state.settings.inter_page_delay)
            .include_page_numbers(
                self.page_numbers
                    .as_deref()
                    .map(is_checked)
                    .unwrap_or(true),
            );
        if let Some(profile) = non_empty(&self.profile) {
            builder = builder.profile(profile.parse::<DocumentProfile>()?);
        }
        if let Some(format) = non_empty(&self.format) {
            builder = builder.output_format(format.parse::<OutputFormat>()?);
        }
        if let Some(dpi) = non_empty(&self.dpi) {
            let dpi: u32 = dpi
                .parse()
                .map_err(|_| ApiError::bad_request(format!("dpi must be a number, got '{dpi}'")))?;
            builder = builder.dpi(dpi);
        }
        Ok(builder.build()?)
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Checkbox semantics: `on`, `true`, `1` and `yes` enable.
pub fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// POST /api/ocr
pub async fn ocr(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let form = OcrForm::read(multipart).await?;
    let upload = form
        .file
        .as_ref()
        .filter(|u| !u.data.is_empty())
        .ok_or_else(|| ApiError::bad_request("A PDF file is required in the 'file' field"))?;
    let config = form.to_config(&state)?;
    let api_key = state
        .resolve_key(form.api_key.as_deref())
        .ok_or_else(|| ApiError::unauthorized("An API key is required"))?;
    let model = state.models.for_key(&api_key)?;

    info!(
        "OCR request: '{}' ({} bytes), profile={}, format={}, dpi={}",
        upload.file_name,
        upload.data.len(),
        config.profile,
        config.output_format,
        config.dpi
    );

    let ctx = RunContext::new(
        model,
        Rasterizer::new(state.settings.rasterizer.clone()),
        config,
    )
    .with_pdf_options(state.settings.pdf.clone());
    let output = run(&ctx, &upload.data, Some(&LogProgress)).await?;

    let file_name = output_filename(&upload.file_name, output.format);
    Ok(attachment(output, &file_name))
}

fn attachment(output: ConversionOutput, file_name: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.format.mime_type()),
    );
    if let Ok(v) = HeaderValue::from_str(&content_disposition(file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    headers.insert("x-ocr-pages", HeaderValue::from(output.stats.rasterized_pages));
    headers.insert("x-ocr-failed-pages", HeaderValue::from(output.stats.failed_pages));
    (StatusCode::OK, headers, output.bytes).into_response()
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// in RFC 5987 form.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        percent_encode(file_name)
    )
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

// ── Key check ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CheckKeyResponse {
    pub ok: bool,
    pub model: String,
}

/// POST /api/check-key
pub async fn check_key(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<CheckKeyResponse>> {
    let form = OcrForm::read(multipart).await?;
    let api_key = state
        .resolve_key(form.api_key.as_deref())
        .ok_or_else(|| ApiError::unauthorized("An API key is required"))?;
    let model = state.models.for_key(&api_key)?;
    model.check_connection().await.map_err(|e| {
        ApiError::new(StatusCode::BAD_GATEWAY, "CONNECTION_FAILED", e.to_string())
    })?;
    info!("API key check succeeded for {}", model.name());
    Ok(Json(CheckKeyResponse {
        ok: true,
        model: model.name(),
    }))
}
