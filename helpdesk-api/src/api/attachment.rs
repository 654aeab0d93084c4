//! Attachment upload, listing and download.
//!
//! Uploaded files are written to `upload_dir` under a collision-free name,
//! `<uuid>-<sanitized original name>`, before the row is inserted. If the
//! insert fails the file is removed again.

use chrono::Utc;
use rocket::form::{Form, FromForm};
use rocket::fs::{NamedFile, TempFile};
use rocket::http::{ContentType, Header};
use rocket::serde::json::Json;
use rocket::tokio::fs;
use rocket::{Responder, Route, State, get, post};
use serde::Serialize;
use ts_rs::TS;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult, parse_id};
use crate::models::{Attachment, AttachmentView, NewAttachment};
use crate::notifier::Notifier;
use crate::orm::DbConn;
use crate::orm::attachment::{add_attachment, get_attachment, list_attachments};
use crate::session_guards::AuthenticatedUser;

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(FromForm)]
pub struct Upload<'r> {
    pub file: Option<TempFile<'r>>,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct AttachmentCreated {
    pub success: bool,
    pub message: String,
    pub attachment: Attachment,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct AttachmentList {
    pub attachments: Vec<AttachmentView>,
}

#[derive(Responder)]
pub struct AttachmentFile {
    inner: (ContentType, NamedFile),
    disposition: Header<'static>,
}

/// Replaces everything but ASCII letters, digits, `.` and `-` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn storage_name(original: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(original))
}

/// Upload a file.
///
/// - **URL:** `/api/tickets/<id>/attachments`
/// - **Method:** `POST` (`multipart/form-data`, field `file`)
/// - **Authentication:** Required; requesters only on their own tickets
///
/// A missing or empty file is a 400 and nothing is stored.
#[post("/tickets/<id>/attachments", data = "<upload>")]
pub async fn create(
    db: DbConn,
    config: &State<AppConfig>,
    notifier: &State<Notifier>,
    auth_user: AuthenticatedUser,
    id: &str,
    upload: Form<Upload<'_>>,
) -> ApiResult<Json<AttachmentCreated>> {
    let ticket_id = parse_id(id, "ticket")?;
    let uploader = auth_user.user;
    let ticket = super::visible_ticket(&db, &uploader, ticket_id).await?;

    let Some(mut file) = upload.into_inner().file.filter(|f| f.len() > 0) else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let original_filename = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "upload".to_string());
    let mime_type = file
        .content_type()
        .map(|ct| format!("{}/{}", ct.top(), ct.sub()))
        .unwrap_or_else(|| DEFAULT_MIME.to_string());
    let size = file.len() as i64;
    let filename = storage_name(&original_filename);

    fs::create_dir_all(&config.upload_dir).await?;
    let path = config.upload_dir.join(&filename);
    file.move_copy_to(&path).await?;

    let new_attachment = NewAttachment {
        ticket_id,
        filename,
        original_filename,
        mime_type,
        size,
        uploaded_by: uploader.id,
        created_at: Utc::now().naive_utc(),
    };
    let stored = db
        .run(move |conn| add_attachment(conn, &ticket, &uploader, new_attachment))
        .await;
    let (attachment, notifications) = match stored {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&path).await {
                warn!("Could not remove orphaned upload {}: {}", path.display(), rm);
            }
            return Err(e.into());
        }
    };

    info!(
        "Attachment {} ({} bytes) added to ticket {}",
        attachment.id, attachment.size, ticket_id
    );
    notifier.dispatch_all(&db, &notifications).await;

    Ok(Json(AttachmentCreated {
        success: true,
        message: "File attached".to_string(),
        attachment,
    }))
}

/// Attachments on a ticket, oldest first, with uploader names.
#[get("/tickets/<id>/attachments")]
pub async fn list(db: DbConn, auth_user: AuthenticatedUser, id: &str) -> ApiResult<Json<AttachmentList>> {
    let ticket_id = parse_id(id, "ticket")?;
    super::visible_ticket(&db, &auth_user.user, ticket_id).await?;
    let attachments = db.run(move |conn| list_attachments(conn, ticket_id)).await?;
    Ok(Json(AttachmentList { attachments }))
}

/// Download the stored file under its original name. Same visibility rule
/// as the ticket itself.
#[get("/tickets/<id>/attachments/<attachment_id>/file")]
pub async fn download(
    db: DbConn,
    config: &State<AppConfig>,
    auth_user: AuthenticatedUser,
    id: &str,
    attachment_id: &str,
) -> ApiResult<AttachmentFile> {
    let ticket_id = parse_id(id, "ticket")?;
    let attachment_id = parse_id(attachment_id, "attachment")?;
    super::visible_ticket(&db, &auth_user.user, ticket_id).await?;

    let attachment = db
        .run(move |conn| get_attachment(conn, ticket_id, attachment_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Attachment not found"))?;

    let path = config.upload_dir.join(&attachment.filename);
    let file = NamedFile::open(&path).await.map_err(|e| {
        warn!("Attachment {} missing from {}: {}", attachment.id, path.display(), e);
        ApiError::not_found("Attachment file not found")
    })?;

    let content_type = ContentType::parse_flexible(&attachment.mime_type).unwrap_or(ContentType::Binary);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment.original_filename.replace(['"', '\\'], "_")
    );
    Ok(AttachmentFile {
        inner: (content_type, file),
        disposition: Header::new("Content-Disposition", disposition),
    })
}

pub fn routes() -> Vec<Route> {
    routes![create, list, download]
}
