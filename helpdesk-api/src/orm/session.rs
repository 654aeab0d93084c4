use chrono::Utc;
use diesel::prelude::*;

use crate::models::User;
use crate::schema::{sessions, users};

/// Resolves a session token to its user. Unknown and expired tokens give
/// `None`; expiry is checked at query time.
pub fn get_session_user(conn: &mut SqliteConnection, token: &str) -> QueryResult<Option<User>> {
    let now = Utc::now().naive_utc();
    sessions::table
        .inner_join(users::table)
        .filter(sessions::id.eq(token))
        .filter(sessions::expires_at.gt(now))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()
}

/// Deletes a session. Returns the number of rows removed, zero when the
/// token was unknown.
pub fn delete_session(conn: &mut SqliteConnection, token: &str) -> QueryResult<usize> {
    diesel::delete(sessions::table.filter(sessions::id.eq(token))).execute(conn)
}
