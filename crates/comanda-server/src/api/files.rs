//! Sandboxed File Store — listing, single-file CRUD, bulk CRUD, multipart
//! upload, download/content, and zip backup/restore. Every path first
//! passes through [`sandbox::resolve`].

use std::io::{Read, Write};

use axum::extract::{Multipart, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use comanda_core::ComandaError;

use crate::sandbox;
use crate::state::AppState;

const UPLOAD_LIMIT_BYTES: usize = 32 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", get(list_entries))
        .route(
            "/files",
            post(create_file).put(update_file).delete(delete_file),
        )
        .route(
            "/files/bulk",
            post(bulk_create).put(bulk_update).delete(bulk_delete),
        )
        .route("/files/upload", post(upload_file))
        .route("/files/download", get(download_file))
        .route("/files/content", get(read_content))
        .route("/files/backup", post(backup))
        .route("/files/restore", post(restore))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PathQuery {
    path: Option<String>,
}

#[derive(Serialize)]
struct Entry {
    name: String,
    path: String,
    size: u64,
    is_dir: bool,
    modified_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    methods: Option<Vec<&'static str>>,
}

async fn list_entries(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let rel = q.path.unwrap_or_default();
    let dir = sandbox::resolve(&state, &rel)?;
    let read_dir =
        std::fs::read_dir(&dir).map_err(|e| ComandaError::not_found(format!("{}: {e}", dir.display())))?;

    let mut entries = Vec::new();
    for item in read_dir.filter_map(|e| e.ok()) {
        let metadata = item.metadata().map_err(|e| ComandaError::Internal(e.to_string()))?;
        let name = item.file_name().to_string_lossy().to_string();
        let is_yaml = name.ends_with(".yaml") || name.ends_with(".yml");
        entries.push(Entry {
            path: if rel.is_empty() { name.clone() } else { format!("{rel}/{name}") },
            name,
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            methods: if is_yaml { Some(vec!["POST"]) } else { None },
        });
    }
    Ok(Json(serde_json::json!({ "entries": entries })))
}

#[derive(Deserialize)]
struct FileBody {
    path: String,
    #[serde(default)]
    content: String,
}

fn write_new(path: &std::path::Path, content: &str) -> Result<(), ComandaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| ComandaError::ConfigIo(e.to_string()))
}

async fn create_file(
    State(state): State<AppState>,
    Json(body): Json<FileBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let target = sandbox::resolve(&state, &body.path)?;
    if target.exists() {
        return Err(ComandaError::conflict(format!("already exists: {}", body.path)));
    }
    write_new(&target, &body.content)?;
    Ok(Json(serde_json::json!({ "success": true, "path": body.path })))
}

async fn update_file(
    State(state): State<AppState>,
    Json(body): Json<FileBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let target = sandbox::resolve(&state, &body.path)?;
    if !target.exists() {
        return Err(ComandaError::not_found(format!("not found: {}", body.path)));
    }
    write_new(&target, &body.content)?;
    Ok(Json(serde_json::json!({ "success": true, "path": body.path })))
}

async fn delete_file(
    State(state): State<AppState>,
    Json(body): Json<FileBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let target = sandbox::resolve(&state, &body.path)?;
    if !target.exists() {
        return Err(ComandaError::not_found(format!("not found: {}", body.path)));
    }
    std::fs::remove_file(&target).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true, "path": body.path })))
}

#[derive(Serialize)]
struct BulkResult {
    path: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn bulk_create(
    State(state): State<AppState>,
    Json(items): Json<Vec<FileBody>>,
) -> Json<serde_json::Value> {
    bulk_apply(items, |item| {
        let state = state.clone();
        async move { create_file(State(state), Json(item)).await.map(|_| ()) }
    })
    .await
}

async fn bulk_update(
    State(state): State<AppState>,
    Json(items): Json<Vec<FileBody>>,
) -> Json<serde_json::Value> {
    bulk_apply(items, |item| {
        let state = state.clone();
        async move { update_file(State(state), Json(item)).await.map(|_| ()) }
    })
    .await
}

async fn bulk_delete(
    State(state): State<AppState>,
    Json(items): Json<Vec<FileBody>>,
) -> Json<serde_json::Value> {
    bulk_apply(items, |item| {
        let state = state.clone();
        async move { delete_file(State(state), Json(item)).await.map(|_| ()) }
    })
    .await
}

async fn bulk_apply<F, Fut>(items: Vec<FileBody>, op: F) -> Json<serde_json::Value>
where
    F: Fn(FileBody) -> Fut,
    Fut: std::future::Future<Output = Result<(), ComandaError>>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut all_success = true;
    for item in items {
        let path = item.path.clone();
        match op(item).await {
            Ok(()) => results.push(BulkResult { path, success: true, error: None }),
            Err(e) => {
                all_success = false;
                results.push(BulkResult { path, success: false, error: Some(e.to_string()) });
            }
        }
    }
    Json(serde_json::json!({ "success": all_success, "results": results }))
}

async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let mut saved = Vec::new();
    let mut total = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ComandaError::Validation(format!("invalid multipart body: {e}")))?
    {
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| ComandaError::Validation("multipart field missing filename".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ComandaError::Validation(format!("reading upload: {e}")))?;

        total += data.len();
        if total > UPLOAD_LIMIT_BYTES {
            return Err(ComandaError::Validation(format!(
                "upload exceeds {UPLOAD_LIMIT_BYTES}-byte limit"
            )));
        }

        let target = sandbox::resolve(&state, &filename)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        }
        std::fs::write(&target, &data).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        saved.push(filename);
    }

    Ok(Json(serde_json::json!({ "success": true, "files": saved })))
}

async fn download_file(State(state): State<AppState>, Query(q): Query<PathQuery>) -> Result<Response, ComandaError> {
    let rel = q.path.ok_or_else(|| ComandaError::Validation("missing path".to_string()))?;
    let target = sandbox::resolve(&state, &rel)?;
    let bytes = std::fs::read(&target).map_err(|e| ComandaError::not_found(format!("{}: {e}", target.display())))?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

async fn read_content(
    State(state): State<AppState>,
    Query(q): Query<PathQuery>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let rel = q.path.ok_or_else(|| ComandaError::Validation("missing path".to_string()))?;
    let target = sandbox::resolve(&state, &rel)?;
    let content =
        std::fs::read_to_string(&target).map_err(|e| ComandaError::not_found(format!("{}: {e}", target.display())))?;
    Ok(Json(serde_json::json!({ "path": rel, "content": content })))
}

/// Recursively collect every file beneath `root`, returning paths relative
/// to `root` with forward-slash separators (stable zip entry names).
fn collect_files(root: &std::path::Path, base: &std::path::Path, out: &mut Vec<std::path::PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
    Ok(())
}

async fn backup(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ComandaError> {
    let backups_dir = state.data_dir.join("backups");
    std::fs::create_dir_all(&backups_dir).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| ComandaError::Internal(e.to_string()))?
        .as_nanos();
    let archive_name = format!("backup-{nanos}.zip");
    let archive_path = backups_dir.join(&archive_name);

    let mut files = Vec::new();
    collect_files(&state.data_dir, &state.data_dir, &mut files).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    files.retain(|p| !p.starts_with("backups"));

    let file = std::fs::File::create(&archive_path).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    for relative in &files {
        let entry_name = relative.to_string_lossy().replace('\\', "/");
        zip.start_file(&entry_name, options)
            .map_err(|e| ComandaError::Internal(e.to_string()))?;
        let mut buf = Vec::new();
        std::fs::File::open(state.data_dir.join(relative))
            .and_then(|mut f| f.read_to_end(&mut buf))
            .map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        zip.write_all(&buf).map_err(|e| ComandaError::Internal(e.to_string()))?;
    }
    zip.finish().map_err(|e| ComandaError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({ "success": true, "archive": format!("backups/{archive_name}") })))
}

#[derive(Deserialize)]
struct RestoreBody {
    archive: String,
}

async fn restore(
    State(state): State<AppState>,
    Json(body): Json<RestoreBody>,
) -> Result<Json<serde_json::Value>, ComandaError> {
    let archive_path = sandbox::resolve(&state, &body.archive)?;
    let file = std::fs::File::open(&archive_path)
        .map_err(|e| ComandaError::not_found(format!("{}: {e}", archive_path.display())))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ComandaError::Validation(format!("invalid zip: {e}")))?;

    let mut restored = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| ComandaError::Validation(e.to_string()))?;
        let name = entry.name().to_string();
        let target = sandbox::resolve(&state, &name)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        std::fs::write(&target, &buf).map_err(|e| ComandaError::ConfigIo(e.to_string()))?;
        restored.push(name);
    }

    Ok(Json(serde_json::json!({ "success": true, "files": restored })))
}
