pub mod attachment;
pub mod auth;
pub mod comment;
pub mod dashboard;
pub mod notification;
pub mod report;
pub mod status;
pub mod technician;
pub mod ticket;
pub mod unit;

use rocket::Route;
use serde::Serialize;
use ts_rs::TS;

use crate::error::ApiResult;
use crate::models::{Ticket, User};
use crate::orm::DbConn;
use crate::orm::ticket::get_ticket;
use crate::policy::ensure_ticket_access;

/// `{ success, message }` body returned by mutating endpoints.
#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        SuccessResponse {
            success: true,
            message: message.into(),
        }
    }
}

/// Loads a ticket the user is allowed to see: 404 when missing, 403 when it
/// belongs to another requester.
pub(crate) async fn visible_ticket(db: &DbConn, user: &User, ticket_id: i32) -> ApiResult<Ticket> {
    let ticket = db.run(move |conn| get_ticket(conn, ticket_id)).await?;
    ensure_ticket_access(user, ticket)
}

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(attachment::routes());
    routes.extend(auth::routes());
    routes.extend(comment::routes());
    routes.extend(dashboard::routes());
    routes.extend(notification::routes());
    routes.extend(report::routes());
    routes.extend(status::routes());
    routes.extend(technician::routes());
    routes.extend(ticket::routes());
    routes.extend(unit::routes());
    routes
}
