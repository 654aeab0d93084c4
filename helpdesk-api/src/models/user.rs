use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::{
    Identifiable, Insertable, Queryable, QueryableByName, Selectable,
    deserialize::{self, FromSql},
    serialize::{self, Output, ToSql},
    sql_types::Text,
    sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::schema::users;

/// Error returned when a string does not name a known enumeration value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} value: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The role a user holds. Fixed at account creation; decides which tickets
/// the user can see and which mutations they may perform.
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
pub enum Role {
    Admin,
    Tecnico,
    Solicitante,
}

impl Role {
    /// Roles that make up the help-desk staff.
    pub const STAFF: [Role; 2] = [Role::Admin, Role::Tecnico];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Tecnico => "tecnico",
            Role::Solicitante => "solicitante",
        }
    }

    pub fn is_staff(&self) -> bool {
        Self::STAFF.contains(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "tecnico" => Ok(Role::Tecnico),
            "solicitante" => Ok(Role::Solicitante),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

impl ToSql<Text, Sqlite> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Role {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(s.parse::<Role>()?)
    }
}

#[derive(Queryable, Selectable, Identifiable, QueryableByName, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String, // Will be unique
    pub password_hash: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

impl User {
    /// The user as exposed over the API, without the password hash.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, TS)]
#[ts(export)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, TS)]
#[ts(export)]
pub struct PublicUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Entry in the technician picker: staff members a ticket can be assigned to.
#[derive(Queryable, Selectable, Deserialize, Serialize, Debug, TS)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Technician {
    pub id: i32,
    pub name: String,
    pub email: String,
}
