use diesel::{Associations, Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::schema::{sectors, units};

/// A physical building or campus where work is requested.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, TS)]
#[diesel(table_name = units)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Unit {
    pub id: i32,
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = units)]
pub struct NewUnit {
    pub name: String,
}

/// A sector inside a unit (a department, floor or wing).
#[derive(
    Queryable, Selectable, Identifiable, Associations, Debug, Clone, Serialize, Deserialize, TS,
)]
#[diesel(belongs_to(Unit))]
#[diesel(table_name = sectors)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Sector {
    pub id: i32,
    pub unit_id: i32, // Foreign key to Unit
    pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = sectors)]
pub struct NewSector {
    pub unit_id: i32,
    pub name: String,
}
