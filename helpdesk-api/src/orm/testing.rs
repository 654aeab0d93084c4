#![cfg(any(test, feature = "test-staging"))]
//! Test fixtures: in-memory databases, seeded Rocket instances and a mail
//! transport that records instead of sending.
//!
//! Only compiled for unit tests or with the `test-staging` feature, which the
//! integration tests and the admin CLI tests enable.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::figment::{
    util::map,
    value::{Map, Value},
};
use rocket::{Build, Rocket, fairing::AdHoc};
use uuid::Uuid;

use super::db::{DbConn, DbRunner, run_pending_migrations, set_foreign_keys};
use crate::admin_init_fairing::admin_init_fairing;
use crate::models::{Role, Ticket, User, UserInput};
use crate::notifier::{MailError, MailTransport, Notifier, OutgoingMail};
use crate::orm::login::hash_password;
use crate::orm::ticket::{TicketInput, create_ticket};
use crate::orm::unit::{get_unit_by_name, insert_sector, insert_unit, list_sectors_for_unit};
use crate::orm::user::{get_user_by_email, insert_user};
use crate::schema::tickets;

/// Password of every seeded fixture user.
pub const TEST_PASSWORD: &str = "secret123";

/// Seeded users, all with [`TEST_PASSWORD`]. The default admin
/// (`admin@example.com` / `admin`) is created by the admin fairing.
pub const TEST_USERS: [(&str, Role); 4] = [
    ("tech@example.com", Role::Tecnico),
    ("tech2@example.com", Role::Tecnico),
    ("requester@example.com", Role::Solicitante),
    ("requester2@example.com", Role::Solicitante),
];

/// Seeded units and their sectors.
pub const TEST_UNITS: [(&str, &[&str]); 2] = [
    ("Unidade Central", &["Manutenção", "Almoxarifado"]),
    ("Unidade Norte", &["Recepção"]),
];

// Argon2 is slow in debug builds; hash each distinct password once.
static HASHES: LazyLock<Mutex<HashMap<String, String>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn cached_hash(password: &str) -> String {
    let mut hashes = HASHES.lock().unwrap();
    hashes
        .entry(password.to_string())
        .or_insert_with(|| hash_password(password).expect("hash test password"))
        .clone()
}

/// Configures SQLite for speed over durability. Tests only.
fn set_sqlite_test_pragmas(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(
        r#"
        PRAGMA synchronous = OFF;
        PRAGMA journal_mode = OFF;
        "#,
    )
}

fn set_sqlite_test_pragmas_fairing() -> AdHoc {
    AdHoc::on_ignite("Set SQLite Test Pragmas", |rocket| async {
        let conn = DbConn::get_one(&rocket)
            .await
            .expect("database connection for test pragmas");
        conn.run(set_sqlite_test_pragmas)
            .await
            .expect("Failed to set SQLite PRAGMAs");
        rocket
    })
}

fn test_data_init_fairing() -> AdHoc {
    AdHoc::on_ignite("Test Data Initialization", |rocket| async {
        let conn = DbConn::get_one(&rocket)
            .await
            .expect("database connection for test data initialization");
        conn.run(create_test_data)
            .await
            .expect("Failed to create test data");
        rocket
    })
}

/// Seeds [`TEST_UNITS`] and [`TEST_USERS`]. Safe to call more than once.
pub fn create_test_data(conn: &mut SqliteConnection) -> QueryResult<()> {
    for (unit_name, sector_names) in TEST_UNITS {
        let unit = match get_unit_by_name(conn, unit_name)? {
            Some(unit) => unit,
            None => insert_unit(conn, unit_name)?,
        };
        let existing: Vec<String> = list_sectors_for_unit(conn, unit.id)?
            .into_iter()
            .map(|s| s.name)
            .collect();
        for sector_name in sector_names {
            if !existing.iter().any(|n| n == sector_name) {
                insert_sector(conn, unit.id, sector_name)?;
            }
        }
    }

    for (email, role) in TEST_USERS {
        if get_user_by_email(conn, email)?.is_none() {
            insert_test_user(conn, email, TEST_PASSWORD, role);
        }
    }
    Ok(())
}

/// Inserts a user whose display name is the local part of `email`.
pub fn insert_test_user(conn: &mut SqliteConnection, email: &str, password: &str, role: Role) -> User {
    let name = email.split('@').next().unwrap_or(email).to_string();
    insert_user(
        conn,
        UserInput {
            name,
            email: email.to_string(),
            password_hash: cached_hash(password),
            role,
        },
    )
    .expect("insert test user")
}

/// Opens a ticket in the first seeded unit and sector, creating them when
/// the database has none.
pub fn insert_test_ticket(conn: &mut SqliteConnection, creator_id: i32) -> Ticket {
    let (unit_name, sector_names) = TEST_UNITS[0];
    let unit = match get_unit_by_name(conn, unit_name).expect("look up unit") {
        Some(unit) => unit,
        None => insert_unit(conn, unit_name).expect("insert unit"),
    };
    let sector = match list_sectors_for_unit(conn, unit.id)
        .expect("list sectors")
        .into_iter()
        .find(|s| s.name == sector_names[0])
    {
        Some(sector) => sector,
        None => insert_sector(conn, unit.id, sector_names[0]).expect("insert sector"),
    };
    let creator = crate::orm::user::get_user(conn, creator_id)
        .expect("look up creator")
        .expect("creator exists");

    let (ticket, _) = create_ticket(
        conn,
        TicketInput {
            requester_name: "Maria Souza".to_string(),
            unit_id: unit.id,
            sector_id: sector.id,
            exact_location: "Sala 12".to_string(),
            points_quantity: 3,
            responsible_user: "João".to_string(),
            observations: None,
        },
        &creator,
    )
    .expect("create test ticket");
    ticket
}

/// Assigns a ticket directly, bypassing history and notifications.
pub fn assign_test_ticket(conn: &mut SqliteConnection, ticket_id: i32, user_id: i32) -> Ticket {
    diesel::update(tickets::table.find(ticket_id))
        .set(tickets::assigned_to.eq(Some(user_id)))
        .execute(conn)
        .expect("assign test ticket");
    tickets::table
        .find(ticket_id)
        .select(Ticket::as_select())
        .first(conn)
        .expect("reload test ticket")
}

/// Mail transport that keeps every mail in memory.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingTransport {
    /// A transport that rejects every mail.
    pub fn failing() -> Self {
        RecordingTransport {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Rejected(format!("refusing mail to {}", mail.to)));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// A Rocket instance backed by a fresh shared in-memory database with
/// migrations applied, the default admin plus [`TEST_USERS`] seeded, uploads
/// in a unique temporary directory and mail disabled.
pub fn test_rocket() -> Rocket<Build> {
    let unique_db_name = format!("file:test_db_{}?mode=memory&cache=shared", Uuid::new_v4());
    let db_config: Map<_, Value> = map! {
        "url" => unique_db_name.into(),
        "pool_size" => 5.into(),
        "timeout" => 5.into(),
    };
    let upload_dir = std::env::temp_dir().join(format!("helpdesk_uploads_{}", Uuid::new_v4()));

    let figment = rocket::Config::figment()
        .merge(("databases", map!["sqlite_db" => db_config]))
        .merge(("helpdesk.upload_dir", upload_dir))
        .merge(("helpdesk.secure_cookies", false))
        .merge(("helpdesk.mail.transport", "disabled"));

    let rocket = rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(super::db::set_foreign_keys_fairing())
        .attach(set_sqlite_test_pragmas_fairing())
        .attach(super::db::run_migrations_fairing())
        .attach(admin_init_fairing())
        .attach(test_data_init_fairing());

    crate::assemble(rocket)
}

/// Like [`test_rocket`] but with notifications forwarded to `transport`.
pub fn test_rocket_with_mail(transport: Arc<RecordingTransport>) -> Rocket<Build> {
    test_rocket().manage(Notifier::new(transport, "http://helpdesk.test"))
}

/// A fresh in-memory database with foreign keys on and migrations applied.
pub fn setup_test_db() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .expect("Failed to create in-memory SQLite database");
    set_foreign_keys(&mut conn).expect("Failed to enable foreign keys");
    run_pending_migrations(&mut conn).expect("Failed to run pending migrations");
    conn
}

/// Wraps a borrowed connection so async helpers written against
/// [`DbRunner`] can run without a Rocket instance.
pub struct FakeDbConn<'a>(pub &'a mut diesel::SqliteConnection);

impl<'a> FakeDbConn<'a> {
    pub async fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut diesel::SqliteConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        // Safety: a FakeDbConn holds the only borrow of the connection and is
        // used from one task at a time.
        unsafe {
            let conn_ptr =
                self.0 as *const diesel::SqliteConnection as *mut diesel::SqliteConnection;
            f(&mut *conn_ptr)
        }
    }
}

impl<'a> DbRunner for FakeDbConn<'a> {
    fn run<F, R>(&self, f: F) -> impl std::future::Future<Output = R>
    where
        F: FnOnce(&mut diesel::SqliteConnection) -> R + Send + 'static,
        R: Send + 'static,
    {
        FakeDbConn::run(self, f)
    }
}
