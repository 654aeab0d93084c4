use chrono::NaiveDateTime;
use diesel::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::Ticket;
use crate::schema::attachments;

#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize, TS,
)]
#[diesel(belongs_to(Ticket))]
#[diesel(table_name = attachments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Attachment {
    pub id: i32,
    pub ticket_id: i32,
    /// Name of the stored file inside the upload directory.
    pub filename: String,
    /// Name the file had on the uploader's machine.
    pub original_filename: String,
    pub mime_type: String,
    pub size: i64,
    pub uploaded_by: i32,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub ticket_id: i32,
    pub filename: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size: i64,
    pub uploaded_by: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct AttachmentView {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub uploaded_by_name: String,
}
