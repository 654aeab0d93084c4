use diesel::prelude::*;

use crate::models::{NewSector, NewUnit, Sector, Unit};
use crate::orm::last_insert_rowid;
use crate::schema::{sectors, tickets, units};

pub fn insert_unit(conn: &mut SqliteConnection, name: &str) -> QueryResult<Unit> {
    diesel::insert_into(units::table)
        .values(&NewUnit {
            name: name.to_string(),
        })
        .execute(conn)?;
    let id = last_insert_rowid(conn)?;
    units::table.find(id).select(Unit::as_select()).first(conn)
}

pub fn get_unit(conn: &mut SqliteConnection, unit_id: i32) -> QueryResult<Option<Unit>> {
    units::table
        .find(unit_id)
        .select(Unit::as_select())
        .first(conn)
        .optional()
}

pub fn get_unit_by_name(conn: &mut SqliteConnection, name: &str) -> QueryResult<Option<Unit>> {
    units::table
        .filter(units::name.eq(name))
        .select(Unit::as_select())
        .first(conn)
        .optional()
}

/// All units ordered by name.
pub fn list_units(conn: &mut SqliteConnection) -> QueryResult<Vec<Unit>> {
    units::table
        .order(units::name.asc())
        .select(Unit::as_select())
        .load(conn)
}

/// Removes a unit and its sectors. Fails while any ticket references the unit.
pub fn delete_unit(conn: &mut SqliteConnection, unit_id: i32) -> QueryResult<usize> {
    conn.transaction(|conn| {
        diesel::delete(sectors::table.filter(sectors::unit_id.eq(unit_id))).execute(conn)?;
        diesel::delete(units::table.find(unit_id)).execute(conn)
    })
}

pub fn insert_sector(conn: &mut SqliteConnection, unit_id: i32, name: &str) -> QueryResult<Sector> {
    diesel::insert_into(sectors::table)
        .values(&NewSector {
            unit_id,
            name: name.to_string(),
        })
        .execute(conn)?;
    let id = last_insert_rowid(conn)?;
    sectors::table.find(id).select(Sector::as_select()).first(conn)
}

pub fn get_sector(conn: &mut SqliteConnection, sector_id: i32) -> QueryResult<Option<Sector>> {
    sectors::table
        .find(sector_id)
        .select(Sector::as_select())
        .first(conn)
        .optional()
}

/// Sectors of one unit ordered by name.
pub fn list_sectors_for_unit(conn: &mut SqliteConnection, unit_id: i32) -> QueryResult<Vec<Sector>> {
    sectors::table
        .filter(sectors::unit_id.eq(unit_id))
        .order(sectors::name.asc())
        .select(Sector::as_select())
        .load(conn)
}

/// Every sector with the name of its unit, ordered by unit then sector.
pub fn list_all_sectors(conn: &mut SqliteConnection) -> QueryResult<Vec<(Sector, String)>> {
    sectors::table
        .inner_join(units::table)
        .order((units::name.asc(), sectors::name.asc()))
        .select((Sector::as_select(), units::name))
        .load(conn)
}

/// Fails while any ticket references the sector.
pub fn delete_sector(conn: &mut SqliteConnection, sector_id: i32) -> QueryResult<usize> {
    diesel::delete(sectors::table.find(sector_id)).execute(conn)
}

pub fn count_tickets_for_unit(conn: &mut SqliteConnection, unit_id: i32) -> QueryResult<i64> {
    tickets::table
        .filter(tickets::unit_id.eq(unit_id))
        .count()
        .get_result(conn)
}
