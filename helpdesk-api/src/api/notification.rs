use rocket::serde::json::Json;
use rocket::{Route, get, patch};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::SuccessResponse;
use crate::error::{ApiError, ApiResult};
use crate::logged_json::LoggedJson;
use crate::models::NotificationView;
use crate::orm::DbConn;
use crate::orm::notification::{list_notifications, list_unread_notifications, mark_read};
use crate::session_guards::AuthenticatedUser;

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
}

#[derive(Deserialize, Serialize, Debug, TS)]
#[ts(export)]
pub struct MarkReadRequest {
    pub notification_id: Option<i32>,
}

/// The caller's latest 50 notifications, newest first.
#[get("/notifications")]
pub async fn list(db: DbConn, auth_user: AuthenticatedUser) -> ApiResult<Json<NotificationList>> {
    let user_id = auth_user.user.id;
    let notifications = db.run(move |conn| list_notifications(conn, user_id)).await?;
    Ok(Json(NotificationList { notifications }))
}

/// The caller's latest 10 unread notifications, newest first.
#[get("/notifications/unread")]
pub async fn unread(db: DbConn, auth_user: AuthenticatedUser) -> ApiResult<Json<NotificationList>> {
    let user_id = auth_user.user.id;
    let notifications = db
        .run(move |conn| list_unread_notifications(conn, user_id))
        .await?;
    Ok(Json(NotificationList { notifications }))
}

/// Mark one notification read.
///
/// - **URL:** `/api/notifications`
/// - **Method:** `PATCH`
/// - **Authentication:** Required
///
/// `{ "notification_id": 7 }`. A missing id is a 400. Someone else's
/// notification is reported exactly like a missing one, 404.
#[patch("/notifications", data = "<request>")]
pub async fn mark_as_read(
    db: DbConn,
    auth_user: AuthenticatedUser,
    request: LoggedJson<MarkReadRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let notification_id = request
        .notification_id
        .ok_or_else(|| ApiError::bad_request("Notification id is required"))?;
    let user_id = auth_user.user.id;

    if db.run(move |conn| mark_read(conn, notification_id, user_id)).await? {
        Ok(Json(SuccessResponse::new("Notification marked as read")))
    } else {
        Err(ApiError::not_found("Notification not found"))
    }
}

pub fn routes() -> Vec<Route> {
    routes![list, unread, mark_as_read]
}
