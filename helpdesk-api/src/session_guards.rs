//! Request guards resolving the `session_id` cookie to a user.
//!
//! ```rust,ignore
//! #[get("/tickets")]
//! async fn list(db: DbConn, user: AuthenticatedUser) -> ApiResult<Json<TicketList>> { .. }
//!
//! #[get("/technicians")]
//! async fn technicians(db: DbConn, staff: StaffUser) -> ApiResult<Json<TechnicianList>> { .. }
//! ```

use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};

use crate::models::{Role, User};
use crate::orm::DbConn;
use crate::orm::login::SESSION_COOKIE;
use crate::orm::session::get_session_user;
use crate::policy::require_role;

/// A user holding a live session.
///
/// Fails with 401 when the cookie is missing, the token is unknown or the
/// session has expired.
#[derive(Debug)]
pub struct AuthenticatedUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.cookies().get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        let db = match request.guard::<DbConn>().await {
            Outcome::Success(db) => db,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };

        match db.run(move |conn| get_session_user(conn, &token)).await {
            Ok(Some(user)) => Outcome::Success(AuthenticatedUser { user }),
            Ok(None) => Outcome::Error((Status::Unauthorized, ())),
            Err(e) => {
                error!("Database error resolving session: {:?}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// An authenticated admin or technician. Requesters get 403.
#[derive(Debug)]
pub struct StaffUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StaffUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth_user = match AuthenticatedUser::from_request(request).await {
            Outcome::Success(user) => user,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        match require_role(Some(&auth_user.user), &Role::STAFF) {
            Ok(_) => Outcome::Success(StaffUser {
                user: auth_user.user,
            }),
            Err(_) => Outcome::Error((Status::Forbidden, ())),
        }
    }
}
