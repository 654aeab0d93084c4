use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::{
    Associations, Identifiable, Insertable, Queryable, Selectable,
    deserialize::{self, FromSql},
    serialize::{self, Output, ToSql},
    sql_types::Text,
    sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::{ParseEnumError, Ticket, TicketStatus};
use crate::schema::notifications;

/// The ticket event a notification reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NovoTicket,
    Comentario,
    MudancaStatus,
    Atribuicao,
    Anexo,
}

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::NovoTicket,
        NotificationType::Comentario,
        NotificationType::MudancaStatus,
        NotificationType::Atribuicao,
        NotificationType::Anexo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::NovoTicket => "novo_ticket",
            NotificationType::Comentario => "comentario",
            NotificationType::MudancaStatus => "mudanca_status",
            NotificationType::Atribuicao => "atribuicao",
            NotificationType::Anexo => "anexo",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("notification type", s))
    }
}

impl ToSql<Text, Sqlite> for NotificationType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for NotificationType {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(s.parse::<NotificationType>()?)
    }
}

#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize, TS,
)]
#[diesel(belongs_to(Ticket))]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Notification {
    pub id: i32,
    /// Recipient.
    pub user_id: i32,
    pub ticket_id: i32,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: i32,
    pub ticket_id: i32,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// A notification with the ticket fields shown in the notification menu.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub requester_name: String,
    pub status: TicketStatus,
}
