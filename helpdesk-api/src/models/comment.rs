use chrono::NaiveDateTime;
use diesel::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::{Role, Ticket};
use crate::schema::comments;

#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize, TS,
)]
#[diesel(belongs_to(Ticket))]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Comment {
    pub id: i32,
    pub ticket_id: i32,
    pub user_id: i32,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub ticket_id: i32,
    pub user_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// A comment with its author's name and role.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user_name: String,
    pub user_role: Role,
}
