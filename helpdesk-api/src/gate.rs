//! Login gate for page routes.
//!
//! A request without a `session_id` cookie whose path is not public is
//! rewritten to `GET /gate/login`, which answers with a redirect to the login
//! page. API routes are public here because they answer 401 JSON on their
//! own. Only the presence of the cookie is checked; pages validate the
//! session through the API.

use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::response::Redirect;
use rocket::{Route, get};

use crate::orm::login::SESSION_COOKIE;

const PUBLIC_PREFIXES: [&str; 7] = [
    "/login",
    "/api",
    "/public",
    "/assets",
    "/favicon.ico",
    "/gate",
    "/unauthorized",
];

pub fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

pub fn login_gate() -> AdHoc {
    AdHoc::on_request("Login Gate", |req, _| {
        Box::pin(async move {
            if req.cookies().get(SESSION_COOKIE).is_some() || is_public(req.uri().path().as_str()) {
                return;
            }
            req.set_method(Method::Get);
            req.set_uri(uri!("/gate/login"));
        })
    })
}

#[get("/gate/login")]
fn gate_login() -> Redirect {
    Redirect::to(uri!("/login"))
}

pub fn routes() -> Vec<Route> {
    routes![gate_login]
}
