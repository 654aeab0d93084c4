//! Credential checks and session issuing.
//!
//! Passwords are stored as Argon2 PHC strings. A successful login inserts a
//! session row keyed by a random UUID and sets that token as the HTTP-only
//! `session_id` cookie.

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use rocket::http::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewSession, User};
use crate::orm::DbRunner;
use crate::schema::{sessions, users};

pub const SESSION_COOKIE: &str = "session_id";

/// Message for every failed login. Unknown emails and wrong passwords must
/// be indistinguishable.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Checked against when the email is unknown, so that path costs the same
/// Argon2 verification as a wrong password.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("no-such-account").unwrap_or_default());

/// Hashes a password with Argon2 default parameters and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Constant-time comparison done by argon2. A malformed stored hash never
/// matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

pub async fn find_user_by_email<D: DbRunner>(db: &D, email: &str) -> ApiResult<Option<User>> {
    let email = email.trim().to_owned();
    let user = db
        .run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(User::as_select())
                .first::<User>(conn)
                .optional()
        })
        .await?;
    Ok(user)
}

/// Inserts a session for `user_id` expiring `days` from now and returns its token.
pub async fn create_and_store_session<D: DbRunner>(
    db: &D,
    user_id: i32,
    days: i64,
) -> ApiResult<String> {
    let token = Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let new_session = NewSession {
        id: token.clone(),
        user_id,
        created_at: now,
        expires_at: now + Duration::days(days),
    };

    db.run(move |conn| {
        diesel::insert_into(sessions::table)
            .values(&new_session)
            .execute(conn)
    })
    .await?;

    Ok(token)
}

fn set_session_cookie(cookies: &CookieJar<'_>, token: &str, config: &AppConfig) {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(rocket::time::Duration::days(config.session_days))
        .path("/")
        .build();
    cookies.add(cookie);
}

/// Checks the credentials, opens a session and sets the session cookie.
pub async fn process_login<D: DbRunner>(
    db: &D,
    cookies: &CookieJar<'_>,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> ApiResult<User> {
    let rejected = || ApiError::Unauthorized(INVALID_CREDENTIALS.to_string());

    if email.trim().is_empty() || password.is_empty() {
        return Err(rejected());
    }

    let Some(user) = find_user_by_email(db, email).await? else {
        verify_password(password, &DUMMY_HASH);
        return Err(rejected());
    };

    if !verify_password(password, &user.password_hash) {
        return Err(rejected());
    }

    let token = create_and_store_session(db, user.id, config.session_days).await?;
    set_session_cookie(cookies, &token, config);
    info!("User {} logged in", user.id);

    Ok(user)
}
