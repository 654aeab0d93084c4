//! Service status for monitoring.

use diesel::RunQueryDsl;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, get};
use serde::Serialize;
use ts_rs::TS;

use crate::built_info;
use crate::orm::DbConn;

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct ServiceStatus {
    /// `running`, or `degraded` when the database does not answer.
    pub status: String,
    pub database_reachable: bool,
    pub version: String,
    pub built: String,
    pub git_commit: Option<String>,
}

/// Service status.
///
/// - **URL:** `/api/1/status`
/// - **Method:** `GET`
/// - **Authentication:** None required
///
/// Runs a trivial query against the database. 200 when it answers, 503 with
/// `"status": "degraded"` when it does not.
#[get("/1/status")]
pub async fn service_status(db: DbConn) -> (Status, Json<ServiceStatus>) {
    let database_reachable = db
        .run(|conn| diesel::sql_query("SELECT 1").execute(conn))
        .await
        .map_err(|e| warn!("Status check could not query the database: {}", e))
        .is_ok();

    let (code, status) = if database_reachable {
        (Status::Ok, "running")
    } else {
        (Status::ServiceUnavailable, "degraded")
    };
    (
        code,
        Json(ServiceStatus {
            status: status.to_string(),
            database_reachable,
            version: built_info::PKG_VERSION.to_string(),
            built: built_info::BUILT_TIME_UTC.to_string(),
            git_commit: built_info::GIT_COMMIT_HASH.map(str::to_string),
        }),
    )
}

pub fn routes() -> Vec<Route> {
    routes![service_status]
}
