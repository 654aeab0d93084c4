use clap::Subcommand;
use diesel::sqlite::SqliteConnection;
use helpdesk_api::models::Unit;
use helpdesk_api::orm::unit::{
    count_tickets_for_unit, delete_unit, get_unit_by_name, insert_unit, list_sectors_for_unit,
    list_units,
};

use super::utils::{SearchFilter, confirm};

#[derive(Subcommand)]
pub enum UnitAction {
    #[command(about = "List units and their sectors, optionally filtered by search term")]
    Ls {
        #[arg(help = "Search term (regex by default, use -F for fixed string)")]
        search_term: Option<String>,
        #[arg(
            short = 'F',
            long = "fixed-string",
            help = "Treat search term as fixed string instead of regex"
        )]
        fixed_string: bool,
    },
    #[command(about = "Add a new unit")]
    Add {
        #[arg(short, long, help = "Unit name")]
        name: String,
    },
    #[command(about = "Remove units matching search term, with their sectors")]
    Rm {
        #[arg(help = "Search term to match units for removal (regex by default, use -F for fixed string)")]
        search_term: String,
        #[arg(
            short = 'F',
            long = "fixed-string",
            help = "Treat search term as fixed string instead of regex"
        )]
        fixed_string: bool,
        #[arg(short = 'y', long = "yes", help = "Skip confirmation prompt")]
        yes: bool,
    },
}

pub fn handle_unit_command_with_conn(
    conn: &mut SqliteConnection,
    action: UnitAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UnitAction::Ls { search_term, fixed_string } => {
            unit_ls_impl(conn, search_term, fixed_string)?;
        }
        UnitAction::Add { name } => {
            unit_add_impl(conn, &name)?;
        }
        UnitAction::Rm { search_term, fixed_string, yes } => {
            unit_rm_impl(conn, search_term, fixed_string, yes)?;
        }
    }
    Ok(())
}

pub fn unit_ls_impl(
    conn: &mut SqliteConnection,
    search_term: Option<String>,
    fixed_string: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = SearchFilter::new(search_term, fixed_string)?;
    let units: Vec<Unit> = list_units(conn)?
        .into_iter()
        .filter(|unit| filter.matches(&unit.name))
        .collect();

    if units.is_empty() {
        println!("No units found.");
        return Ok(());
    }

    println!("Units:");
    for unit in units {
        let tickets = count_tickets_for_unit(conn, unit.id)?;
        println!("  ID: {}, Name: {}, Tickets: {}", unit.id, unit.name, tickets);
        for sector in list_sectors_for_unit(conn, unit.id)? {
            println!("    Sector ID: {}, Name: {}", sector.id, sector.name);
        }
    }

    Ok(())
}

pub fn unit_add_impl(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Unit, Box<dyn std::error::Error>> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Unit name cannot be empty".into());
    }
    if get_unit_by_name(conn, name)?.is_some() {
        return Err(format!("Unit '{}' already exists", name).into());
    }

    let unit = insert_unit(conn, name)?;
    println!("Unit created successfully!");
    println!("ID: {}", unit.id);
    println!("Name: {}", unit.name);
    Ok(unit)
}

/// Returns how many units were deleted. Units referenced by tickets are kept
/// and reported.
pub fn unit_rm_impl(
    conn: &mut SqliteConnection,
    search_term: String,
    fixed_string: bool,
    yes: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let filter = SearchFilter::new(Some(search_term), fixed_string)?;
    let matching_units: Vec<Unit> = list_units(conn)?
        .into_iter()
        .filter(|unit| filter.matches(&unit.name))
        .collect();

    if matching_units.is_empty() {
        println!("No units found matching the search term.");
        return Ok(0);
    }

    println!("Found {} unit(s) matching the search term:", matching_units.len());
    for unit in &matching_units {
        let sectors = list_sectors_for_unit(conn, unit.id)?.len();
        println!("  ID: {}, Name: {}, Sectors: {}", unit.id, unit.name, sectors);
    }

    if !yes
        && !confirm(&format!(
            "Are you sure you want to delete these {} unit(s) and their sectors?",
            matching_units.len()
        ))?
    {
        println!("Operation cancelled.");
        return Ok(0);
    }

    let mut deleted_count = 0;
    let mut errors = Vec::new();

    for unit in matching_units {
        let tickets = count_tickets_for_unit(conn, unit.id)?;
        if tickets > 0 {
            errors.push(format!(
                "Unit {} (ID: {}) still has {} ticket(s)",
                unit.name, unit.id, tickets
            ));
            continue;
        }
        match delete_unit(conn, unit.id) {
            Ok(rows_affected) if rows_affected > 0 => {
                deleted_count += 1;
                println!("Deleted unit: {} (ID: {})", unit.name, unit.id);
            }
            Ok(_) => {}
            Err(e) => errors.push(format!(
                "Failed to delete unit {} (ID: {}): {}",
                unit.name, unit.id, e
            )),
        }
    }

    println!("Successfully deleted {} unit(s).", deleted_count);

    if !errors.is_empty() {
        println!("Errors encountered:");
        for error in errors {
            println!("  {}", error);
        }
        return Err("Some deletions failed".into());
    }

    Ok(deleted_count)
}
