use std::io::{self, Write};

use diesel::{prelude::*, sqlite::SqliteConnection};
use dotenvy::dotenv;
use helpdesk_api::orm::{
    run_pending_migrations, set_foreign_keys,
    unit::{get_unit, list_units},
};
use regex::Regex;

/// Opens `DATABASE_URL` with foreign keys on and the schema migrated.
pub fn establish_connection() -> Result<SqliteConnection, Box<dyn std::error::Error>> {
    dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let mut conn = SqliteConnection::establish(&database_url)?;
    set_foreign_keys(&mut conn)?;
    run_pending_migrations(&mut conn)
        .map_err(|e| format!("Failed to run pending migrations: {}", e))?;
    Ok(conn)
}

/// Search term given to `ls` and `rm`: a regex by default, a plain substring
/// with `-F`.
pub enum SearchFilter {
    All,
    Fixed(String),
    Pattern(Regex),
}

impl SearchFilter {
    pub fn new(term: Option<String>, fixed_string: bool) -> Result<Self, Box<dyn std::error::Error>> {
        match term {
            None => Ok(SearchFilter::All),
            Some(term) if fixed_string => Ok(SearchFilter::Fixed(term)),
            Some(term) => {
                let regex = Regex::new(&term)
                    .map_err(|e| format!("Invalid regex pattern '{}': {}", term, e))?;
                Ok(SearchFilter::Pattern(regex))
            }
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::Fixed(term) => text.contains(term.as_str()),
            SearchFilter::Pattern(regex) => regex.is_match(text),
        }
    }
}

/// Asks a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

/// Resolve a unit identifier (either an ID or a name) to a unit ID. A number
/// is treated as an ID and must exist; anything else is looked up by name,
/// ignoring case.
pub fn resolve_unit_id(
    conn: &mut SqliteConnection,
    unit_identifier: &str,
) -> Result<i32, Box<dyn std::error::Error>> {
    if let Ok(id) = unit_identifier.parse::<i32>() {
        return match get_unit(conn, id)? {
            Some(_) => Ok(id),
            None => Err(format!("Unit with ID {} does not exist", id).into()),
        };
    }

    let wanted = unit_identifier.to_lowercase();
    list_units(conn)?
        .into_iter()
        .find(|unit| unit.name.to_lowercase() == wanted)
        .map(|unit| unit.id)
        .ok_or_else(|| format!("Unit with name '{}' does not exist", unit_identifier).into())
}
