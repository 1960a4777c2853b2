use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, StaticApiKey};
use crate::error::{AppError, AppResult};
use crate::models::{Attachment, NewAttachment};
use crate::repo;
use crate::state::AppState;
use crate::storage::BlobStore;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub attachment: Attachment,
}

#[derive(Serialize)]
pub struct BucketUploadResponse {
    pub message: String,
    pub url: String,
}

/// Uploads an image attachment to object storage and links it to the todo,
/// then pushes the refreshed attachment list back through the transactional
/// full-replace path.
pub async fn upload_s3(
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let store = state.object_store.clone();
    let mut attachment = attach_uploaded_file(&state, &store, todo_id, &user, multipart).await?;

    // Re-sync the whole list the way the repository's replace path expects:
    // read, then write every row back. The replace regenerates row ids, so
    // the response carries the re-inserted row, not the stale one.
    let mut conn = state.db()?;
    if let Some((_, files)) = repo::get_by_id(&mut conn, todo_id, user.user_id)? {
        let rows = files
            .iter()
            .map(|file| NewAttachment {
                todo_id,
                path: file.path.clone(),
                attachment_order: file.attachment_order,
            })
            .collect();
        if let Some(replaced) = repo::replace_attachments(&mut conn, todo_id, user.user_id, rows)? {
            if let Some(current) = replaced.into_iter().find(|row| row.path == attachment.path) {
                attachment = current;
            }
        }
    }

    Ok(Json(UploadResponse {
        message: "file uploaded and attachment created successfully".to_string(),
        attachment,
    }))
}

/// Same pipeline as `upload_s3`, but the blob lands in the local uploads
/// directory and the linking stops at the single-row insert.
pub async fn upload_local(
    State(state): State<AppState>,
    Path(todo_id): Path<i64>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let store = state.local_store.clone();
    let attachment = attach_uploaded_file(&state, &store, todo_id, &user, multipart).await?;

    Ok(Json(UploadResponse {
        message: "file uploaded and attachment created successfully".to_string(),
        attachment,
    }))
}

/// Raw bucket upload with no todo linkage, behind the static-key gate. The
/// object keeps its original filename.
pub async fn upload_bucket(
    State(state): State<AppState>,
    _gate: StaticApiKey,
    multipart: Multipart,
) -> AppResult<Json<BucketUploadResponse>> {
    let (filename, bytes) = read_file_field(multipart).await?;
    let content_type = mime_guess::from_path(&filename)
        .first()
        .map(|mime| mime.to_string());

    state
        .object_store
        .put_object(&filename, bytes, content_type)
        .await
        .map_err(|err| {
            error!(error = %err, key = %filename, "bucket upload failed");
            AppError::internal("failed to upload file")
        })?;

    Ok(Json(BucketUploadResponse {
        message: "file uploaded successfully".to_string(),
        url: state.object_store.object_url(&filename),
    }))
}

/// The attachment pipeline of the upload routes: ownership check, extension
/// allow-list, unique key, blob write, then the transactional order-assign
/// and insert. If the metadata write fails after the blob was stored, the
/// blob is deleted again so it does not linger orphaned.
async fn attach_uploaded_file(
    state: &AppState,
    store: &Arc<dyn BlobStore>,
    todo_id: i64,
    user: &AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<Attachment> {
    {
        let mut conn = state.db()?;
        if repo::get_by_id(&mut conn, todo_id, user.user_id)?.is_none() {
            return Err(AppError::not_found());
        }
    }

    let (filename, bytes) = read_file_field(multipart).await?;

    let ext = allowed_extension(&filename)
        .ok_or_else(|| AppError::bad_request("file type not allowed"))?;

    let key = unique_object_key(&ext);
    let content_type = mime_guess::from_path(&filename)
        .first()
        .map(|mime| mime.to_string());

    store
        .put_object(&key, bytes, content_type)
        .await
        .map_err(|err| {
            error!(error = %err, key = %key, "failed to store attachment blob");
            AppError::internal("failed to store attachment")
        })?;

    let url = store.object_url(&key);

    let mut conn = state.db()?;
    let created = match repo::create_attachment(&mut conn, todo_id, user.user_id, &url) {
        Ok(Some(attachment)) => attachment,
        Ok(None) => {
            discard_blob(store, &key).await;
            return Err(AppError::not_found());
        }
        Err(err) => {
            error!(error = %err, key = %key, todo_id, "attachment metadata write failed");
            discard_blob(store, &key).await;
            return Err(AppError::from(err));
        }
    };

    info!(
        todo_id,
        user_id = user.user_id,
        attachment_id = created.id,
        order = created.attachment_order,
        "attachment created"
    );

    Ok(created)
}

/// Compensating delete after a failed metadata write. Best effort: a second
/// failure leaves the blob orphaned and is only logged.
async fn discard_blob(store: &Arc<dyn BlobStore>, key: &str) {
    if let Err(err) = store.delete_object(key).await {
        warn!(error = %err, key = %key, "orphaned blob could not be deleted");
    }
}

async fn read_file_field(mut multipart: Multipart) -> AppResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|name| name.to_string())
            .ok_or_else(|| AppError::bad_request("filename is required"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(format!("failed to read file bytes: {err}")))?;

        return Ok((filename, bytes.to_vec()));
    }

    Err(AppError::bad_request("no file uploaded"))
}

fn allowed_extension(filename: &str) -> Option<String> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn unique_object_key(ext: &str) -> String {
    format!("{}.{ext}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::{allowed_extension, unique_object_key};

    #[test]
    fn accepts_image_extensions_case_insensitively() {
        assert_eq!(allowed_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("pic.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("a.b.webp").as_deref(), Some("webp"));
    }

    #[test]
    fn rejects_disallowed_or_missing_extensions() {
        assert!(allowed_extension("malware.exe").is_none());
        assert!(allowed_extension("notes.pdf").is_none());
        assert!(allowed_extension("no_extension").is_none());
    }

    #[test]
    fn object_keys_are_unique_and_keep_the_extension() {
        let first = unique_object_key("png");
        let second = unique_object_key("png");
        assert_ne!(first, second);
        assert!(first.ends_with(".png"));
    }
}
