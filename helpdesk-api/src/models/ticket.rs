use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::{
    AsChangeset, Identifiable, Insertable, Queryable, QueryableByName, Selectable,
    deserialize::{self, FromSql},
    serialize::{self, Output, ToSql},
    sql_types::{Nullable, Text},
    sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::ParseEnumError;
use crate::schema::tickets;

/// Where a ticket is in its lifecycle.
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
pub enum TicketStatus {
    Aberto,
    EmAndamento,
    AguardandoMaterial,
    Concluido,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Aberto,
        TicketStatus::EmAndamento,
        TicketStatus::AguardandoMaterial,
        TicketStatus::Concluido,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Aberto => "aberto",
            TicketStatus::EmAndamento => "em_andamento",
            TicketStatus::AguardandoMaterial => "aguardando_material",
            TicketStatus::Concluido => "concluido",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

impl ToSql<Text, Sqlite> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for TicketStatus {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(s.parse::<TicketStatus>()?)
    }
}

/// Outcome of asking a ticket to move from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The requested status is the stored one; no history is written.
    Unchanged,
    Changed {
        from: TicketStatus,
        to: TicketStatus,
        /// Set when the move enters `concluido` and `completed_at` must be stamped.
        stamps_completion: bool,
    },
}

/// Decides what a status change does.
///
/// Every status may move to every other status. Entering `concluido`
/// stamps the completion time; leaving it keeps the earlier stamp.
pub fn transition(current: TicketStatus, requested: TicketStatus) -> Transition {
    if current == requested {
        return Transition::Unchanged;
    }
    Transition::Changed {
        from: current,
        to: requested,
        stamps_completion: requested == TicketStatus::Concluido,
    }
}

#[derive(
    Queryable,
    Selectable,
    Identifiable,
    QueryableByName,
    Debug,
    Clone,
    Serialize,
    Deserialize,
    TS,
)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Ticket {
    pub id: i32,
    pub requester_name: String,
    pub unit_id: i32,
    pub sector_id: i32,
    pub exact_location: String,
    pub points_quantity: i32,
    pub responsible_user: String,
    pub observations: Option<String>,
    pub status: TicketStatus,
    pub assigned_to: Option<i32>,
    pub created_by: i32,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
    #[ts(type = "string")]
    pub updated_at: NaiveDateTime,
    #[ts(type = "string | null")]
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub requester_name: String,
    pub unit_id: i32,
    pub sector_id: i32,
    pub exact_location: String,
    pub points_quantity: i32,
    pub responsible_user: String,
    pub observations: Option<String>,
    pub status: TicketStatus,
    pub created_by: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column changes produced by a staff update. `None` leaves a column alone.
#[derive(AsChangeset, Default, Debug)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<Option<i32>>,
    pub completed_at: Option<Option<NaiveDateTime>>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A ticket joined with the display names the UI shows next to it.
#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct TicketDetails {
    #[diesel(embed)]
    #[serde(flatten)]
    pub ticket: Ticket,
    #[diesel(sql_type = Text)]
    pub unit_name: String,
    #[diesel(sql_type = Text)]
    pub sector_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub assigned_to_name: Option<String>,
    #[diesel(sql_type = Text)]
    pub creator_name: String,
}
