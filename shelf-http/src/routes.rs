use std::io::ErrorKind;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use shelf_core::{
    AuthGate, Catalog, CatalogManager, CredentialVerifier, DeleteRequest, Principal, Upload,
    UploadRequest,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CatalogManager>,
    pub gate: Arc<AuthGate>,
    pub credentials: Arc<dyn CredentialVerifier>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let protected = Router::new()
        .route("/verify-token", get(verify_token))
        .route("/upload", post(upload))
        .route("/delete-model", post(delete_model))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/api/status", get(status))
        .route("/login", post(login))
        .route("/models.json", get(catalog))
        .route("/models/{*path}", get(serve_model))
        .route("/previews/{*path}", get(serve_preview))
        .merge(protected)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn build_cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin.map(str::trim).filter(|o| !o.is_empty())?;
    let value = match HeaderValue::from_str(origin) {
        Ok(v) => v,
        Err(_) => {
            warn!(origin, "invalid cors origin");
            return None;
        }
    };
    Some(
        CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(Duration::from_secs(86400)),
    )
}

async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let principal = state.gate.authorize(auth_header)?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "server running" }))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(ApiError::BadRequest("username and password are required".into()));
    };
    info!(username = %username, "login attempt");
    let gate = state.gate.clone();
    let credentials = state.credentials.clone();
    // argon2 verification blocks for a noticeable time.
    let token = tokio::task::spawn_blocking(move || {
        gate.login(credentials.as_ref(), &username, &password)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({ "message": "authenticated", "token": token })))
}

async fn verify_token(Extension(principal): Extension<Principal>) -> Json<Value> {
    Json(json!({ "valid": true, "user": principal.subject }))
}

async fn upload(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut name = None;
    let mut mesh = None;
    let mut preview = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "modelName" => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?,
                )
            }
            "model" | "preview" => {
                let upload = Upload::from_bytes(file_name, read_field(field).await?);
                if field_name == "model" {
                    mesh = Some(upload);
                } else {
                    preview = Some(upload);
                }
            }
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("modelName is required".into()))?;
    let (Some(mesh), Some(preview)) = (mesh, preview) else {
        return Err(ApiError::BadRequest(
            "both files are required: model and preview".into(),
        ));
    };

    info!(user = %principal.subject, name = %name, "upload received");
    let manager = state.manager.clone();
    let record = tokio::task::spawn_blocking(move || {
        manager.create_or_update(UploadRequest {
            name,
            mesh,
            preview,
        })
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({ "message": "model uploaded", "model": record })))
}

/// Collect a file part chunk by chunk into a single buffer.
async fn read_field(mut field: Field<'_>) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteModelRequest {
    model_name: Option<String>,
    model_path: Option<String>,
    image_path: Option<String>,
}

async fn delete_model(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<DeleteModelRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = body
        .model_name
        .ok_or_else(|| ApiError::BadRequest("modelName is required".into()))?;
    info!(user = %principal.subject, name = %name, "delete received");
    let manager = state.manager.clone();
    let req = DeleteRequest {
        name,
        mesh_path: body.model_path,
        image_path: body.image_path,
    };
    let record = tokio::task::spawn_blocking(move || manager.delete(req))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({
        "message": format!("model \"{}\" deleted", record.name),
        "deleted": record,
    })))
}

async fn catalog(State(state): State<AppState>) -> Result<Json<Catalog>, ApiError> {
    let manager = state.manager.clone();
    let catalog = tokio::task::spawn_blocking(move || manager.catalog())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(catalog))
}

async fn serve_model(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(&state, &format!("models/{path}")).await
}

async fn serve_preview(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    serve_file(&state, &format!("previews/{path}")).await
}

async fn serve_file(state: &AppState, relative: &str) -> Result<Response, ApiError> {
    let abs = state.manager.content_root().resolve(relative)?;
    let bytes = match tokio::fs::read(&abs).await {
        Ok(b) => b,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
            return Err(ApiError::NotFound("file not found".into()));
        }
        Err(e) => return Err(shelf_core::error::ShelfError::from(e).into()),
    };
    Ok(([(header::CONTENT_TYPE, content_type(&abs))], bytes).into_response())
}

fn content_type(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("glb") => "model/gltf-binary",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
