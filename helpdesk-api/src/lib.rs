#[macro_use]
extern crate rocket;

use std::path::Path;

use rocket::figment::value::Map;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use rocket::fs::FileServer;
use rocket::request::Request;
use rocket::serde::json::{Json, Value, json};
use rocket::{Build, Rocket};

pub mod admin_init_fairing;
pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod logged_json;
pub mod models;
pub mod notifier;
pub mod orm;
pub use orm::DbConn;
pub mod policy;
pub mod schema;
pub mod session_guards;

#[cfg(test)]
pub mod generate_types;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[catch(400)]
fn bad_request(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Bad Request",
        "path": req.uri().path().to_string(),
        "status": 400
    }))
}

#[catch(401)]
fn unauthorized(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Unauthorized",
        "path": req.uri().path().to_string(),
        "status": 401
    }))
}

#[catch(403)]
fn forbidden(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Forbidden",
        "path": req.uri().path().to_string(),
        "status": 403
    }))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Not Found",
        "path": req.uri().path().to_string(),
        "status": 404
    }))
}

#[catch(422)]
fn unprocessable_entity(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Unprocessable Entity",
        "path": req.uri().path().to_string(),
        "status": 422
    }))
}

#[catch(500)]
fn internal_server_error(req: &Request) -> Json<Value> {
    Json(json!({
        "error": "Internal Server Error",
        "path": req.uri().path().to_string(),
        "status": 500
    }))
}

#[catch(default)]
fn default_catcher(status: rocket::http::Status, req: &Request) -> Json<Value> {
    Json(json!({
        "error": status.reason().unwrap_or("Unknown Error"),
        "path": req.uri().path().to_string(),
        "status": status.code
    }))
}

/// Attaches everything that does not depend on where the database lives:
/// settings, the mail notifier, the login gate, routes and catchers.
/// `rocket()` and the test harness both build on this after attaching their
/// own database fairings.
pub fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(config::app_config_fairing())
        .attach(notifier::notifier_fairing())
        .attach(gate::login_gate())
        .mount("/api", api::routes())
        .mount("/", gate::routes())
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable_entity,
                internal_server_error,
                default_catcher
            ],
        )
}

fn log_rocket_info(rocket: &Rocket<Build>) {
    let figment = rocket.figment();

    if let Ok(address) = figment.extract_inner::<String>("address") {
        info!("Rocket is running at: {}", address);
    }

    if let Ok(port) = figment.extract_inner::<u16>("port") {
        info!("Rocket is listening on port: {}", port);
    }

    match figment.extract_inner::<Map<String, Value>>("databases.sqlite_db") {
        Ok(db_config) => {
            if let Some(Value::String(url)) = db_config.get("url") {
                info!("Database URL: {}", url);
            } else {
                warn!("Database URL not found in configuration");
            }
        }
        Err(e) => {
            warn!("Failed to extract database configuration: {}", e);
        }
    }

    info!(
        "helpdesk-api v{} built {}{}",
        built_info::PKG_VERSION,
        built_info::BUILT_TIME_UTC,
        built_info::GIT_COMMIT_HASH
            .map(|commit| format!(" from {commit}"))
            .unwrap_or_default()
    );
}

/// Production instance. Tests use `orm::testing::test_rocket` with an
/// in-memory database instead.
pub fn rocket() -> Rocket<Build> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        warn!("DATABASE_URL is not set, using helpdesk.sqlite");
        "helpdesk.sqlite".to_string()
    });

    let figment = Figment::from(rocket::Config::default())
        .merge(Toml::file("Rocket.toml").nested())
        .merge(Env::prefixed("ROCKET_").global())
        .merge(("databases.sqlite_db.url", database_url));

    let rocket = rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(orm::set_foreign_keys_fairing())
        .attach(orm::run_migrations_fairing())
        .attach(admin_init_fairing::admin_init_fairing());

    log_rocket_info(&rocket);

    let rocket = assemble(rocket);
    let static_dir = std::env::var("HELPDESK_STATIC_DIR").unwrap_or_else(|_| "static".to_string());
    if Path::new(&static_dir).is_dir() {
        rocket.mount("/", FileServer::from(static_dir).rank(10))
    } else {
        warn!("Static directory '{}' not found, serving the API only", static_dir);
        rocket
    }
}
