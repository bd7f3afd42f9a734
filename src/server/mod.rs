//! Browser upload surface.
//!
//! | Route | |
//! |---|---|
//! | `GET /` | upload form |
//! | `GET /health` | liveness JSON |
//! | `POST /api/ocr` | multipart upload → document attachment |
//! | `POST /api/check-key` | minimal model round trip with the given key |
//!
//! Each request builds its own [`RunContext`](crate::convert::RunContext)
//! from the form fields and the server settings. Nothing is persisted: the
//! uploaded bytes and page images live only for the request.

pub mod error;
pub mod handlers;
pub mod page;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{AnthropicFactory, AppState, ModelFactory, ServerSettings};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/ocr", post(handlers::ocr))
        .route("/api/check-key", post(handlers::check_key))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OcrError, OcrResult};
    use crate::pipeline::encode::EncodedImage;
    use crate::pipeline::rasterize::RasterizerConfig;
    use crate::vision::VisionModel;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "----pdf-ocr-test-boundary";

    struct StubModel {
        reachable: bool,
    }

    #[async_trait]
    impl VisionModel for StubModel {
        fn name(&self) -> String {
            "stub/vision".into()
        }

        async fn describe_image(&self, _: &EncodedImage, _: &str) -> OcrResult<Option<String>> {
            Ok(Some("stub text".into()))
        }

        async fn check_connection(&self) -> OcrResult<()> {
            if self.reachable {
                Ok(())
            } else {
                Err(OcrError::TranscriptionFailed {
                    detail: "Anthropic API error (401 Unauthorized): invalid x-api-key".into(),
                })
            }
        }
    }

    /// Accepts only the key "good".
    struct StubFactory {
        built: AtomicUsize,
    }

    impl ModelFactory for StubFactory {
        fn for_key(&self, api_key: &str) -> OcrResult<Arc<dyn VisionModel>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubModel {
                reachable: api_key == "good",
            }))
        }
    }

    fn test_state(settings: ServerSettings) -> (AppState, Arc<StubFactory>) {
        let factory = Arc::new(StubFactory {
            built: AtomicUsize::new(0),
        });
        (AppState::with_models(settings, factory.clone()), factory)
    }

    fn no_poppler() -> ServerSettings {
        ServerSettings {
            rasterizer: RasterizerConfig {
                poppler_dir: Some("/nonexistent/poppler/bin".into()),
                work_root: None,
            },
            ..ServerSettings::default()
        }
    }

    /// `(name, filename, value)` triples as a multipart body.
    fn multipart(fields: &[(&str, Option<&str>, &[u8])]) -> Body {
        let mut body = Vec::new();
        for (name, file_name, value) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    async fn post_form(app: Router, uri: &str, body: Body) -> Response {
        app.oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(body)
                .expect("request"),
        )
        .await
        .expect("router response")
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn index_serves_the_form() {
        let (state, _) = test_state(ServerSettings::default());
        let response = create_router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("name=\"profile\""));
        assert!(html.contains("/api/ocr"));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (state, _) = test_state(ServerSettings::default());
        let response = create_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn ocr_without_file_is_rejected() {
        let (state, factory) = test_state(no_poppler());
        let response = post_form(
            create_router(state),
            "/api/ocr",
            multipart(&[("api_key", None, b"good")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "BAD_REQUEST");
        assert_eq!(factory.built.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ocr_without_any_key_is_unauthorized() {
        let (state, _) = test_state(no_poppler());
        let response = post_form(
            create_router(state),
            "/api/ocr",
            multipart(&[("file", Some("scan.pdf"), b"%PDF-1.4\n")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_profile_is_an_invalid_option() {
        let (state, _) = test_state(no_poppler());
        let response = post_form(
            create_router(state),
            "/api/ocr",
            multipart(&[
                ("file", Some("scan.pdf"), b"%PDF-1.4\n"),
                ("api_key", None, b"good"),
                ("profile", None, b"receipt"),
            ]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_OPTION");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("receipt"));
    }

    #[tokio::test]
    async fn missing_rasterizer_is_service_unavailable() {
        let (state, _) = test_state(no_poppler());
        let response = post_form(
            create_router(state),
            "/api/ocr",
            multipart(&[
                ("file", Some("scan.pdf"), b"%PDF-1.4\n"),
                ("api_key", None, b"good"),
                ("format", None, b"pdf"),
            ]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "RASTERIZER_UNAVAILABLE");
        assert_eq!(body["error"]["details"]["binary"], "pdftoppm");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("poppler"));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let settings = ServerSettings {
            max_upload_bytes: 1024,
            ..no_poppler()
        };
        let (state, _) = test_state(settings);
        let big = vec![b'x'; 8 * 1024];
        let response = post_form(
            create_router(state),
            "/api/ocr",
            multipart(&[("file", Some("big.pdf"), big.as_slice()), ("api_key", None, b"good")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn check_key_succeeds_for_reachable_model() {
        let (state, _) = test_state(ServerSettings::default());
        let response = post_form(
            create_router(state),
            "/api/check-key",
            multipart(&[("api_key", None, b"good")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["model"], "stub/vision");
    }

    #[tokio::test]
    async fn check_key_failure_is_bad_gateway() {
        let (state, _) = test_state(ServerSettings::default());
        let response = post_form(
            create_router(state),
            "/api/check-key",
            multipart(&[("api_key", None, b"bad")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "CONNECTION_FAILED");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("401"));
    }

    #[tokio::test]
    async fn check_key_falls_back_to_server_key() {
        let settings = ServerSettings {
            default_api_key: Some("good".into()),
            ..ServerSettings::default()
        };
        let (state, factory) = test_state(settings);
        let response = post_form(
            create_router(state),
            "/api/check-key",
            multipart(&[("api_key", None, b"")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(factory.built.load(Ordering::SeqCst), 1);
    }
}
