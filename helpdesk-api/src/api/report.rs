use rocket::form::FromForm;
use rocket::serde::json::Json;
use rocket::{Route, get};
use serde::Serialize;
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::orm::DbConn;
use crate::orm::report::{DateRange, ReportData, ReportType, run_report};
use crate::session_guards::StaffUser;

#[derive(FromForm, Debug)]
pub struct ReportQuery<'r> {
    #[field(name = "type")]
    pub report_type: Option<&'r str>,
    pub start_date: Option<&'r str>,
    pub end_date: Option<&'r str>,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct ReportResponse {
    pub report_type: ReportType,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub data: ReportData,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Aggregated ticket report.
///
/// - **URL:** `/api/reports?type=<type>&start_date=<date>&end_date=<date>`
/// - **Method:** `GET`
/// - **Authentication:** Admin or technician
///
/// `type` is one of `summary` (default), `by_unit`, `by_sector`,
/// `by_technician` or `monthly`; anything else is a 400. The optional dates
/// bound `created_at` inclusively (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`).
/// The dates are echoed back as given.
#[get("/reports?<query..>")]
pub async fn report(db: DbConn, _staff: StaffUser, query: ReportQuery<'_>) -> ApiResult<Json<ReportResponse>> {
    let report_type = match non_empty(query.report_type) {
        Some(raw) => raw.parse::<ReportType>()?,
        None => ReportType::default(),
    };
    let start_date = non_empty(query.start_date).map(str::to_string);
    let end_date = non_empty(query.end_date).map(str::to_string);
    let range = DateRange::parse(start_date.as_deref(), end_date.as_deref())
        .map_err(ApiError::BadRequest)?;

    let data = db
        .run(move |conn| run_report(conn, report_type, range))
        .await?;
    Ok(Json(ReportResponse {
        report_type,
        start_date,
        end_date,
        data,
    }))
}

pub fn routes() -> Vec<Route> {
    routes![report]
}
