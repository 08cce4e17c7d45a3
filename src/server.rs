//! HTTP front for the edit pipeline
//!
//! Routes:
//! - `POST /generate` with a JSON body referencing the image by path or URL
//! - `POST /generate_upload` with a multipart form carrying the image bytes
//! - `GET /health` reporting model readiness
//!
//! The model is provisioned after the listener is up. Until it is ready (or
//! when loading failed) edit routes answer 503 straight away.

use crate::config::{EditConfig, ServiceConfig};
use crate::executor::{decode_image, EditExecutor, ImageInput};
use crate::pipeline::{ModelSource, OffloadMode};
use crate::provision::{ModelHandle, Provisioner};
use crate::{KontextError, Result};
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

/// Lifecycle of the shared model
#[derive(Debug, Clone)]
pub enum Readiness {
    Loading,
    Ready(ModelHandle),
    Failed(String),
    Released,
}

/// Holds the model handle for the lifetime of the service
#[derive(Debug, Clone)]
pub struct ModelSlot {
    state: Arc<RwLock<Readiness>>,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(Readiness::Loading)),
        }
    }

    /// Make `handle` available to requests. Ignored unless still loading.
    pub async fn publish(&self, handle: ModelHandle) {
        let mut state = self.state.write().await;
        if matches!(*state, Readiness::Loading) {
            *state = Readiness::Ready(handle);
        } else {
            tracing::warn!("Model finished loading after the service left the loading state");
        }
    }

    pub async fn fail(&self, reason: impl Into<String>) {
        let mut state = self.state.write().await;
        if matches!(*state, Readiness::Loading) {
            *state = Readiness::Failed(reason.into());
        }
    }

    /// Current handle, or `ModelNotReady` without waiting
    pub async fn handle(&self) -> Result<ModelHandle> {
        match &*self.state.read().await {
            Readiness::Ready(handle) => Ok(handle.clone()),
            Readiness::Loading => Err(KontextError::ModelNotReady(
                "model is still loading, try again later".into(),
            )),
            Readiness::Failed(reason) => Err(KontextError::ModelNotReady(format!(
                "model failed to load: {}",
                reason
            ))),
            Readiness::Released => {
                Err(KontextError::ModelNotReady("service is shutting down".into()))
            }
        }
    }

    /// Drop the handle. Memory is freed once in-flight requests finish.
    pub async fn release(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.write().await, Readiness::Released);
        let released = matches!(previous, Readiness::Ready(_));
        if released {
            tracing::info!("Model handle released");
        }
        released
    }

    pub async fn health(&self) -> HealthResponse {
        match &*self.state.read().await {
            Readiness::Loading => HealthResponse::status("loading"),
            Readiness::Ready(handle) => HealthResponse {
                offload: Some(handle.offload_mode()),
                free_mb: handle.memory().free_mb(),
                ..HealthResponse::status("ready")
            },
            Readiness::Failed(reason) => HealthResponse {
                detail: Some(reason.clone()),
                ..HealthResponse::status("failed")
            },
            Readiness::Released => HealthResponse::status("released"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offload: Option<OffloadMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthResponse {
    fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            offload: None,
            free_mb: None,
            detail: None,
        }
    }
}

/// Shared state behind every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub slot: ModelSlot,
    pub executor: EditExecutor,
    pub edit: EditConfig,
}

impl AppState {
    pub fn new(slot: ModelSlot, executor: EditExecutor, edit: EditConfig) -> Self {
        Self {
            slot,
            executor,
            edit,
        }
    }
}

/// JSON body of `POST /generate`
#[derive(Debug, Deserialize)]
pub struct EditRequest {
    /// Path or URL; anything but a string is rejected
    #[serde(default)]
    pub image_url: Value,
    pub prompt: String,
    pub guidance_scale: Option<f64>,
    pub num_inference_steps: Option<usize>,
    pub seed: Option<u64>,
}

impl KontextError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidInputKind(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KontextError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Edit failed: {}", self);
        } else {
            tracing::warn!("Edit rejected: {}", self);
        }

        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Build the router with permissive CORS and the given body limit
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate", post(generate))
        .route("/generate_upload", post(generate_upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.slot.health().await)
}

async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EditRequest>, JsonRejection>,
) -> Result<Response> {
    let handle = state.slot.handle().await?;
    let Json(request) = payload.map_err(|e| KontextError::InvalidInputKind(e.body_text()))?;
    let input = ImageInput::try_from(request.image_url)?;

    tracing::info!("Received edit request: {}", request.prompt);
    let options = state.edit.options(
        request.prompt,
        request.guidance_scale,
        request.num_inference_steps,
        request.seed,
    );

    let image = state.executor.edit(&handle, input, &options).await?;
    png_response(&image)
}

async fn generate_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let handle = state.slot.handle().await?;
    let form = UploadForm::read(&mut multipart).await?;

    tracing::info!(
        "Received upload request: {} | filename={}",
        form.prompt,
        form.filename.as_deref().unwrap_or("<unnamed>")
    );

    let file = form.file;
    let image = tokio::task::spawn_blocking(move || decode_image(&file))
        .await
        .map_err(|e| KontextError::ImageLoad(format!("decode task failed: {}", e)))??;

    let options = state
        .edit
        .options(form.prompt, form.guidance_scale, form.num_inference_steps, form.seed);

    let image = state.executor.edit(&handle, image.into(), &options).await?;
    png_response(&image)
}

/// Fields of the `POST /generate_upload` form
#[derive(Debug)]
struct UploadForm {
    prompt: String,
    file: Bytes,
    filename: Option<String>,
    guidance_scale: Option<f64>,
    num_inference_steps: Option<usize>,
    seed: Option<u64>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut prompt = None;
        let mut file = None;
        let mut filename = None;
        let mut guidance_scale = None;
        let mut num_inference_steps = None;
        let mut seed = None;

        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "prompt" => prompt = Some(field.text().await.map_err(invalid_form)?),
                "file" => {
                    filename = field.file_name().map(str::to_string);
                    file = Some(field.bytes().await.map_err(invalid_form)?);
                }
                "guidance_scale" => {
                    let value = field.text().await.map_err(invalid_form)?;
                    guidance_scale = parse_field(&name, &value)?;
                }
                "num_inference_steps" => {
                    let value = field.text().await.map_err(invalid_form)?;
                    num_inference_steps = parse_field(&name, &value)?;
                }
                "seed" => {
                    let value = field.text().await.map_err(invalid_form)?;
                    seed = parse_field(&name, &value)?;
                }
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }

        let prompt = prompt.ok_or_else(|| missing_field("prompt"))?;
        let file = file.ok_or_else(|| missing_field("file"))?;

        Ok(Self {
            prompt,
            file,
            filename,
            guidance_scale,
            num_inference_steps,
            seed,
        })
    }
}

fn invalid_form(err: MultipartError) -> KontextError {
    KontextError::InvalidInputKind(format!("invalid multipart form: {}", err))
}

fn missing_field(name: &str) -> KontextError {
    KontextError::InvalidInputKind(format!("missing form field '{}'", name))
}

/// Parse an optional form value; blank means unset
fn parse_field<T>(name: &str, value: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse()
        .map(Some)
        .map_err(|e| KontextError::InvalidInputKind(format!("invalid value for '{}': {}", name, e)))
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn png_response(image: &DynamicImage) -> Result<Response> {
    let bytes = encode_png(image)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// Provision on a blocking worker and publish the outcome into `slot`
pub async fn provision_into(slot: ModelSlot, provisioner: Provisioner, source: ModelSource) {
    tracing::info!("Loading model {} into memory", source.repo_id);

    match tokio::task::spawn_blocking(move || provisioner.provision(&source)).await {
        Ok(Ok(handle)) => {
            slot.publish(handle).await;
            tracing::info!("Model ready, accepting edit requests");
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to load model: {}", e);
            slot.fail(e.to_string()).await;
        }
        Err(e) => {
            tracing::error!("Provisioning task failed: {}", e);
            slot.fail(e.to_string()).await;
        }
    }
}

/// Run the service until Ctrl-C or SIGTERM, then release the model
pub async fn serve(config: ServiceConfig, provisioner: Provisioner) -> Result<()> {
    let slot = ModelSlot::new();
    let executor = EditExecutor::with_timeout(config.server.fetch_timeout())?;
    let app = router(
        AppState::new(slot.clone(), executor, config.edit.clone()),
        config.server.max_body_bytes,
    );

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    tokio::spawn(provision_into(slot.clone(), provisioner, config.model.source()));

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, releasing model memory");
    slot.release().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{EchoPipeline, FailingPipeline, RecordingLoader};
    use crate::pipeline::KONTEXT_DEV_REPO;
    use crate::probe::{MemoryProbe, MemoryReading, StaticProbe};
    use axum::body::Body;
    use axum::http::Request;
    use image::{GenericImageView, ImageBuffer, Rgb};
    use tower::ServiceExt;

    const BOUNDARY: &str = "kontext-test-boundary";

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        }));
        encode_png(&image).unwrap()
    }

    async fn ready_slot(pipeline: EchoPipeline) -> ModelSlot {
        let slot = ModelSlot::new();
        slot.publish(ModelHandle::new(
            Box::new(pipeline),
            OffloadMode::Model,
            MemoryProbe::Reading(MemoryReading::new(1024, 40960)),
        ))
        .await;
        slot
    }

    fn app(slot: ModelSlot) -> Router {
        let state = AppState::new(slot, EditExecutor::new().unwrap(), EditConfig::default());
        router(state, 8 * 1024 * 1024)
    }

    fn json_request(body: Value) -> Request<Body> {
        raw_json_request(body.to_string())
    }

    fn raw_json_request(body: impl Into<String>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.into()))
            .unwrap()
    }

    fn multipart_request(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, filename, data) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: image/png\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n".as_slice());
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/generate_upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    async fn detail(response: Response) -> String {
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        body["detail"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_generate_before_ready_is_unavailable() {
        let response = app(ModelSlot::new())
            .oneshot(json_request(serde_json::json!({
                "image_url": "https://example.com/dog.jpg",
                "prompt": "make it snow",
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(detail(response).await.contains("loading"));
    }

    #[tokio::test]
    async fn test_upload_after_failed_load_is_unavailable() {
        let slot = ModelSlot::new();
        slot.fail("weights missing").await;

        let png = sample_png(16, 16);
        let response = app(slot)
            .oneshot(multipart_request(&[
                ("prompt", None, b"add a hat".as_slice()),
                ("file", Some("in.png"), png.as_slice()),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(detail(response).await.contains("weights missing"));
    }

    #[tokio::test]
    async fn test_non_string_image_url_is_rejected() {
        let pipeline = EchoPipeline::default();
        let response = app(ready_slot(pipeline.clone()).await)
            .oneshot(json_request(serde_json::json!({ "image_url": 42, "prompt": "x" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(pipeline.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_bodies_are_bad_request() {
        let pipeline = EchoPipeline::default();
        let app = app(ready_slot(pipeline.clone()).await);

        let missing_prompt = app
            .clone()
            .oneshot(json_request(serde_json::json!({ "image_url": "x" })))
            .await
            .unwrap();
        assert_eq!(missing_prompt.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing_prompt.headers()[header::CONTENT_TYPE], "application/json");
        assert!(detail(missing_prompt).await.contains("prompt"));

        let bad_seed = app
            .clone()
            .oneshot(json_request(serde_json::json!({
                "image_url": "x",
                "prompt": "add a hat",
                "seed": "abc",
            })))
            .await
            .unwrap();
        assert_eq!(bad_seed.status(), StatusCode::BAD_REQUEST);
        assert!(!detail(bad_seed).await.is_empty());

        let not_json = app.oneshot(raw_json_request("not json")).await.unwrap();
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
        assert!(!detail(not_json).await.is_empty());

        assert_eq!(pipeline.calls(), 0);
    }

    #[tokio::test]
    async fn test_unready_service_answers_unavailable_before_parsing_body() {
        let response = app(ModelSlot::new())
            .oneshot(json_request(serde_json::json!({ "image_url": "x" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(detail(response).await.contains("loading"));
    }

    #[tokio::test]
    async fn test_generate_from_local_path_returns_png() {
        let path = std::env::temp_dir()
            .join(format!("kontext-studio-server-{}.png", std::process::id()));
        std::fs::write(&path, sample_png(300, 200)).unwrap();

        let pipeline = EchoPipeline::default();
        let response = app(ready_slot(pipeline.clone()).await)
            .oneshot(json_request(serde_json::json!({
                "image_url": path.to_string_lossy(),
                "prompt": "turn the lights on",
                "seed": 3,
            })))
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let output = image::load_from_memory(&body_bytes(response).await).unwrap();
        assert_eq!(output.dimensions(), (300, 200));
        assert_eq!(pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_returns_png_at_original_size() {
        let pipeline = EchoPipeline::default();
        let png = sample_png(120, 90);
        let response = app(ready_slot(pipeline.clone()).await)
            .oneshot(multipart_request(&[
                ("prompt", None, b"make it sepia".as_slice()),
                ("file", Some("photo.png"), png.as_slice()),
                ("guidance_scale", None, b"3.0".as_slice()),
                ("num_inference_steps", None, b"12".as_slice()),
                ("seed", None, b"".as_slice()),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let output = image::load_from_memory(&body_bytes(response).await).unwrap();
        assert_eq!(output.dimensions(), (120, 90));
        assert_eq!(pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let pipeline = EchoPipeline::default();
        let response = app(ready_slot(pipeline.clone()).await)
            .oneshot(multipart_request(&[("prompt", None, b"x".as_slice())]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(pipeline.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_with_bad_number_is_bad_request() {
        let png = sample_png(16, 16);
        let response = app(ready_slot(EchoPipeline::default()).await)
            .oneshot(multipart_request(&[
                ("prompt", None, b"x".as_slice()),
                ("file", Some("in.png"), png.as_slice()),
                ("num_inference_steps", None, b"many".as_slice()),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inference_failure_is_server_error() {
        let slot = ModelSlot::new();
        slot.publish(ModelHandle::new(
            Box::new(FailingPipeline("CUDA out of memory")),
            OffloadMode::Sequential,
            MemoryProbe::Unavailable("test".into()),
        ))
        .await;

        let png = sample_png(16, 16);
        let response = app(slot)
            .oneshot(multipart_request(&[
                ("prompt", None, b"x".as_slice()),
                ("file", Some("in.png"), png.as_slice()),
            ]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(response).await.contains("CUDA out of memory"));
    }

    #[tokio::test]
    async fn test_health_tracks_lifecycle() {
        let slot = ModelSlot::new();
        assert_eq!(slot.health().await.status, "loading");

        let provisioner = Provisioner::new(
            Box::new(StaticProbe(MemoryProbe::Reading(MemoryReading::new(0, 30000)))),
            Box::new(RecordingLoader::default()),
        );
        let source = ModelSource::new(KONTEXT_DEV_REPO, None);
        provision_into(slot.clone(), provisioner, source).await;

        let health = slot.health().await;
        assert_eq!(health.status, "ready");
        assert_eq!(health.offload, Some(OffloadMode::Model));
        assert_eq!(health.free_mb, Some(30000));

        assert!(slot.release().await);
        assert_eq!(slot.health().await.status, "released");
        assert!(matches!(slot.handle().await, Err(KontextError::ModelNotReady(_))));
    }

    #[tokio::test]
    async fn test_failed_provisioning_marks_slot() {
        let slot = ModelSlot::new();
        let loader = RecordingLoader {
            fail_with: Some("401 unauthorized"),
            ..Default::default()
        };
        let provisioner = Provisioner::new(
            Box::new(StaticProbe(MemoryProbe::Unavailable("no driver".into()))),
            Box::new(loader),
        );
        let source = ModelSource::new(KONTEXT_DEV_REPO, None);
        provision_into(slot.clone(), provisioner, source).await;

        let health = slot.health().await;
        assert_eq!(health.status, "failed");
        assert!(health.detail.unwrap().contains("401 unauthorized"));
    }

    #[tokio::test]
    async fn test_late_publish_does_not_revive_released_slot() {
        let slot = ModelSlot::new();
        slot.release().await;
        slot.publish(ModelHandle::new(
            Box::new(EchoPipeline::default()),
            OffloadMode::Model,
            MemoryProbe::Unavailable("test".into()),
        ))
        .await;
        assert_eq!(slot.health().await.status, "released");
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app(ready_slot(EchoPipeline::default()).await)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(health.status, "ready");
        assert_eq!(health.free_mb, Some(39936));
    }

    #[test]
    fn test_parse_field_blank_is_unset() {
        assert_eq!(parse_field::<u64>("seed", "  ").unwrap(), None);
        assert_eq!(parse_field::<u64>("seed", "7").unwrap(), Some(7));
        assert!(parse_field::<f64>("guidance_scale", "high").is_err());
    }
}
