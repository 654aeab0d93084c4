use chrono::NaiveDateTime;
use diesel::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::{Ticket, TicketStatus};
use crate::schema::status_history;

/// One accepted status transition. `old_status` is null for the row written
/// when the ticket is opened.
#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize, TS,
)]
#[diesel(belongs_to(Ticket))]
#[diesel(table_name = status_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct StatusHistory {
    pub id: i32,
    pub ticket_id: i32,
    pub old_status: Option<TicketStatus>,
    pub new_status: TicketStatus,
    pub changed_by: i32,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = status_history)]
pub struct NewStatusHistory {
    pub ticket_id: i32,
    pub old_status: Option<TicketStatus>,
    pub new_status: TicketStatus,
    pub changed_by: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct StatusHistoryView {
    #[serde(flatten)]
    pub entry: StatusHistory,
    pub changed_by_name: String,
}
