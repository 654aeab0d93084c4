use rocket::serde::json::Json;
use rocket::{Route, get};
use serde::Serialize;
use ts_rs::TS;

use crate::error::ApiResult;
use crate::models::Technician;
use crate::orm::DbConn;
use crate::orm::user::list_technicians;
use crate::session_guards::StaffUser;

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct TechnicianList {
    pub technicians: Vec<Technician>,
}

/// Users a ticket can be assigned to.
///
/// - **URL:** `/api/technicians`
/// - **Method:** `GET`
/// - **Authentication:** Admin or technician
///
/// Technicians and admins ordered by name, exposing only id, name and email.
#[get("/technicians")]
pub async fn list(db: DbConn, _staff: StaffUser) -> ApiResult<Json<TechnicianList>> {
    let technicians = db.run(list_technicians).await?;
    Ok(Json(TechnicianList { technicians }))
}

pub fn routes() -> Vec<Route> {
    routes![list]
}
