use rocket::serde::json::Json;
use rocket::{Route, get};
use serde::Serialize;
use ts_rs::TS;

use crate::error::{ApiError, ApiResult, parse_id};
use crate::models::{Sector, Unit};
use crate::orm::DbConn;
use crate::orm::unit::{get_unit, list_sectors_for_unit, list_units};
use crate::session_guards::AuthenticatedUser;

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct UnitList {
    pub units: Vec<Unit>,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct SectorList {
    pub sectors: Vec<Sector>,
}

/// All units, ordered by name.
#[get("/units")]
pub async fn list(db: DbConn, _auth_user: AuthenticatedUser) -> ApiResult<Json<UnitList>> {
    let units = db.run(list_units).await?;
    Ok(Json(UnitList { units }))
}

/// Sectors of one unit, ordered by name. 400 for a non-numeric id, 404 for
/// an unknown unit.
#[get("/units/<id>/sectors")]
pub async fn sectors(db: DbConn, _auth_user: AuthenticatedUser, id: &str) -> ApiResult<Json<SectorList>> {
    let unit_id = parse_id(id, "unit")?;
    let sectors = db
        .run(move |conn| -> ApiResult<Vec<Sector>> {
            get_unit(conn, unit_id)?.ok_or_else(|| ApiError::not_found("Unit not found"))?;
            Ok(list_sectors_for_unit(conn, unit_id)?)
        })
        .await?;
    Ok(Json(SectorList { sectors }))
}

pub fn routes() -> Vec<Route> {
    routes![list, sectors]
}
