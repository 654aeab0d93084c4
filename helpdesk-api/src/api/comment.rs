use rocket::serde::json::Json;
use rocket::{Route, State, get, post};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ApiError, ApiResult, parse_id};
use crate::logged_json::LoggedJson;
use crate::models::CommentView;
use crate::notifier::Notifier;
use crate::orm::DbConn;
use crate::orm::comment::{add_comment, list_comments};
use crate::session_guards::AuthenticatedUser;

#[derive(Deserialize, Serialize, Debug, TS)]
#[ts(export)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct CommentCreated {
    pub success: bool,
    pub message: String,
    pub comment_id: i32,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct CommentList {
    pub comments: Vec<CommentView>,
}

/// Add a comment.
///
/// - **URL:** `/api/tickets/<id>/comments`
/// - **Method:** `POST`
/// - **Authentication:** Required; requesters only on their own tickets
///
/// `{ "content": "..." }`. Blank content is a 400. The ticket's
/// `updated_at` moves forward and the other side of the ticket is notified.
#[post("/tickets/<id>/comments", data = "<request>")]
pub async fn create(
    db: DbConn,
    notifier: &State<Notifier>,
    auth_user: AuthenticatedUser,
    id: &str,
    request: LoggedJson<CommentRequest>,
) -> ApiResult<Json<CommentCreated>> {
    let ticket_id = parse_id(id, "ticket")?;
    let content = request
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Comment content is required"))?;

    let author = auth_user.user;
    let ticket = super::visible_ticket(&db, &author, ticket_id).await?;

    let (comment, notifications) = db
        .run(move |conn| add_comment(conn, &ticket, &author, &content))
        .await?;
    notifier.dispatch_all(&db, &notifications).await;

    Ok(Json(CommentCreated {
        success: true,
        message: "Comment added".to_string(),
        comment_id: comment.id,
    }))
}

/// Comments on a ticket, oldest first, with author name and role.
#[get("/tickets/<id>/comments")]
pub async fn list(db: DbConn, auth_user: AuthenticatedUser, id: &str) -> ApiResult<Json<CommentList>> {
    let ticket_id = parse_id(id, "ticket")?;
    super::visible_ticket(&db, &auth_user.user, ticket_id).await?;
    let comments = db.run(move |conn| list_comments(conn, ticket_id)).await?;
    Ok(Json(CommentList { comments }))
}

pub fn routes() -> Vec<Route> {
    routes![create, list]
}
