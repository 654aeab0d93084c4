//! `LoggedJson<T>`: a [`Json<T>`] data guard that also logs what it accepted.
//!
//! The log line carries the method, the path and the payload re-serialized
//! from the parsed value, cut at [`MAX_LOGGED_BODY`] characters so a long
//! comment does not flood the log. Login keeps plain `Json` so passwords never
//! reach this guard.

use std::fmt;
use std::ops::Deref;

use rocket::data::{self, FromData};
use rocket::serde::json::Json;
use rocket::{Data, Request};
use serde::{Deserialize, Serialize};

pub const MAX_LOGGED_BODY: usize = 500;

pub struct LoggedJson<T>(pub T);

impl<T> LoggedJson<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for LoggedJson<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for LoggedJson<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoggedJson").field(&self.0).finish()
    }
}

/// Serializes `value` for the log, keeping at most [`MAX_LOGGED_BODY`]
/// characters.
fn loggable_body<T: Serialize>(value: &T) -> String {
    let Ok(body) = serde_json::to_string(value) else {
        return "<unserializable>".to_string();
    };
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((cut, _)) => format!("{}... ({} bytes)", &body[..cut], body.len()),
        None => body,
    }
}

#[rocket::async_trait]
impl<'r, T: Deserialize<'r> + Serialize> FromData<'r> for LoggedJson<T> {
    type Error = rocket::serde::json::Error<'r>;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        Json::<T>::from_data(req, data).await.map(|Json(value)| {
            info!(
                "Request body: {} {} | {}",
                req.method(),
                req.uri().path(),
                loggable_body(&value)
            );
            LoggedJson(value)
        })
    }
}
