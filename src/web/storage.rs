//! File uploads, storage browsing and signed downloads

use super::ActionResponse;
use crate::error::ActionError;
use crate::middleware::AdminCtx;
use crate::notice::Notice;
use crate::storage::local::LocalStorage;
use crate::storage::{StorageBackend, StorageError};
use crate::upload::{upload_file, StoredFile, UploadError, UploadPolicy};
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{delete, error, get, post, web, Error, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_upload)
        .service(view_storage)
        .service(delete_storage)
        .service(view_signed);
}

#[derive(Serialize)]
pub struct UploadResponse {
    files: Vec<StoredFile>,
    notices: Vec<Notice>,
}

#[derive(Deserialize)]
pub struct RemoveBody {
    paths: Vec<String>,
}

#[derive(Deserialize)]
pub struct SignedQuery {
    expires: i64,
    token: String,
}

/// Reads one multipart field, giving up once it exceeds `limit` bytes.
async fn read_field(field: &mut actix_multipart::Field, limit: usize) -> Result<Vec<u8>, Error> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::error!("post_upload: multipart read error: {}", e);
            error::ErrorBadRequest("Error interpreting user input.")
        })?;
        buf.extend_from_slice(&bytes);
        if buf.len() > limit {
            break;
        }
    }
    Ok(buf)
}

/// Stores every `file` field under `folder`. Each file is validated on its
/// own; one rejected file does not stop the others.
#[post("/admin/api/uploads/{folder:.*}")]
pub async fn post_upload(
    admin: AdminCtx,
    storage: web::Data<Arc<dyn StorageBackend>>,
    policy: web::Data<UploadPolicy>,
    folder: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let admin = admin.require_admin()?;
    let folder = folder.into_inner();

    let mut files = Vec::new();
    let mut notices = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        log::error!("post_upload: multipart stream error: {}", e);
        error::ErrorBadRequest("Error interpreting user input.")
    })? {
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_owned();
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        let bytes = read_field(&mut field, policy.max_bytes()).await?;
        match upload_file(
            storage.get_ref().as_ref(),
            &policy,
            &folder,
            &filename,
            &content_type,
            bytes,
        )
        .await
        {
            Ok(stored) => {
                log::info!("Admin {} uploaded {}", admin.username, stored.path);
                files.push(stored);
            }
            Err(UploadError::Storage(e)) => {
                notices.push(Notice::from_error(
                    "post_upload",
                    &ActionError::Remote(e.to_string()),
                ));
            }
            Err(e) => notices.push(Notice::error(format!("{}: {}", filename, e))),
        }
    }

    if files.is_empty() && notices.is_empty() {
        return Err(ActionError::validation("No file was attached.").into());
    }
    if !files.is_empty() {
        notices.insert(
            0,
            Notice::success(match files.len() {
                1 => "File uploaded.".to_string(),
                n => format!("{} files uploaded.", n),
            }),
        );
    }

    Ok(HttpResponse::Ok().json(UploadResponse { files, notices }))
}

#[get("/admin/api/storage/{folder:.*}")]
pub async fn view_storage(
    storage: web::Data<Arc<dyn StorageBackend>>,
    folder: web::Path<String>,
) -> Result<HttpResponse, ActionError> {
    let objects = storage.list(&folder).await.map_err(|e| match e {
        StorageError::InvalidPath(p) => {
            ActionError::Validation(format!("Invalid storage path {:?}.", p))
        }
        other => ActionError::Remote(other.to_string()),
    })?;
    Ok(HttpResponse::Ok().json(objects))
}

#[delete("/admin/api/storage")]
pub async fn delete_storage(
    admin: AdminCtx,
    storage: web::Data<Arc<dyn StorageBackend>>,
    body: web::Json<RemoveBody>,
) -> Result<HttpResponse, ActionError> {
    let admin = admin.require_admin()?;
    if body.paths.is_empty() {
        return Err(ActionError::validation("Select at least one file."));
    }

    let removed = storage
        .remove(&body.paths)
        .await
        .map_err(|e| ActionError::Remote(e.to_string()))?;
    log::info!("Admin {} removed {} stored files", admin.username, removed);

    Ok(HttpResponse::Ok().json(ActionResponse::from(Notice::success(format!(
        "Removed {} file(s).",
        removed
    )))))
}

/// Serves a file from local storage when the URL signature checks out.
#[get("/signed/{path:.*}")]
pub async fn view_signed(
    req: HttpRequest,
    local: Option<web::Data<Arc<LocalStorage>>>,
    path: web::Path<String>,
    query: web::Query<SignedQuery>,
) -> Result<HttpResponse, Error> {
    let local = local.ok_or_else(|| error::ErrorNotFound("Not found"))?;

    let file = local
        .verify(&path, query.expires, &query.token)
        .map_err(|e| {
            log::debug!("view_signed: {} rejected: {}", path, e);
            error::ErrorForbidden("This link is invalid or has expired.")
        })?;

    let file = NamedFile::open_async(file)
        .await
        .map_err(|_| error::ErrorNotFound("Not found"))?;
    Ok(file.into_response(&req))
}
