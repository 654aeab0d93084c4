use rocket::serde::json::Json;
use rocket::{Route, get};

use crate::error::ApiResult;
use crate::orm::DbConn;
use crate::orm::report::{DashboardStats, dashboard_stats};
use crate::session_guards::StaffUser;

/// Dashboard figures.
///
/// - **URL:** `/api/dashboard/stats`
/// - **Method:** `GET`
/// - **Authentication:** Admin or technician
///
/// ```json
/// {
///   "stats": { "total_tickets": 12, "open_tickets": 4, "in_progress_tickets": 3,
///              "waiting_material_tickets": 1, "completed_tickets": 4 },
///   "recent_tickets": [ ... ],
///   "unit_stats": [ { "unit_name": "Unidade Central", "ticket_count": 9 } ]
/// }
/// ```
#[get("/dashboard/stats")]
pub async fn stats(db: DbConn, _staff: StaffUser) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(db.run(dashboard_stats).await?))
}

pub fn routes() -> Vec<Route> {
    routes![stats]
}
