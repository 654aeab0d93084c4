//! Login, logout and the current-user check.

use rocket::http::{Cookie, CookieJar, Status};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Route, State, get, post};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::models::PublicUser;
use crate::orm::DbConn;
use crate::orm::login::{SESSION_COOKIE, process_login};
use crate::orm::session::delete_session;
use crate::session_guards::AuthenticatedUser;

/// Missing fields deserialize as empty strings so they fail like any other
/// bad credential instead of as a malformed body.
#[derive(Deserialize, TS)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
}

/// Login endpoint.
///
/// - **URL:** `/api/auth/login`
/// - **Method:** `POST`
/// - **Authentication:** None required
///
/// Checks the credentials and, on success, opens a session and sets the
/// HTTP-only `session_id` cookie.
///
/// ```json
/// { "email": "tech@example.com", "password": "secret" }
/// ```
///
/// **Success (HTTP 200 OK):**
/// ```json
/// {
///   "success": true,
///   "message": "Login successful",
///   "user": { "id": 2, "name": "Ana", "email": "tech@example.com", "role": "tecnico" }
/// }
/// ```
///
/// **Failure (HTTP 401 Unauthorized):** `{ "error": "Invalid email or password" }`
/// for an unknown email, a wrong password or empty fields alike.
#[post("/auth/login", data = "<login>")]
pub async fn login(
    db: DbConn,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
    login: Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = process_login(&db, cookies, config, &login.email, &login.password).await?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: user.public(),
    }))
}

/// Logout endpoint.
///
/// - **URL:** `/api/auth/logout`
/// - **Method:** `POST`
/// - **Authentication:** None required
///
/// Deletes the session named by the cookie, if any, and clears the cookie.
/// Always succeeds.
#[post("/auth/logout")]
pub async fn logout(db: DbConn, cookies: &CookieJar<'_>) -> ApiResult<Json<super::SuccessResponse>> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        let token = cookie.value().to_string();
        db.run(move |conn| delete_session(conn, &token)).await?;
    }
    cookies.remove(Cookie::from(SESSION_COOKIE));
    Ok(Json(super::SuccessResponse::new("Logout successful")))
}

/// Reports whether the request carries a live session.
///
/// - **URL:** `/api/auth/user`
/// - **Method:** `GET`
///
/// `200 { "authenticated": true, "user": {..} }` with a live session,
/// `401 { "authenticated": false }` otherwise.
#[get("/auth/user")]
pub async fn current_user(
    auth_user: Option<AuthenticatedUser>,
) -> Result<Json<AuthStatus>, status::Custom<Json<AuthStatus>>> {
    match auth_user {
        Some(auth) => Ok(Json(AuthStatus {
            authenticated: true,
            user: Some(auth.user.public()),
        })),
        None => Err(status::Custom(
            Status::Unauthorized,
            Json(AuthStatus {
                authenticated: false,
                user: None,
            }),
        )),
    }
}

pub fn routes() -> Vec<Route> {
    routes![login, logout, current_user]
}
