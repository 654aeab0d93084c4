use clap::Subcommand;
use diesel::sqlite::SqliteConnection;
use helpdesk_api::models::Sector;
use helpdesk_api::orm::unit::{
    delete_sector, get_sector, get_unit, insert_sector, list_all_sectors, list_sectors_for_unit,
};

use super::utils::{confirm, resolve_unit_id};

#[derive(Subcommand)]
pub enum SectorAction {
    #[command(about = "List sectors, optionally only those of one unit")]
    Ls {
        #[arg(short, long, help = "Unit ID or name")]
        unit: Option<String>,
    },
    #[command(about = "Add a sector to a unit")]
    Add {
        #[arg(short, long, help = "Unit ID or name")]
        unit: String,
        #[arg(short, long, help = "Sector name")]
        name: String,
    },
    #[command(about = "Remove a sector")]
    Rm {
        #[arg(short, long, help = "Sector ID")]
        id: i32,
        #[arg(short = 'y', long = "yes", help = "Skip confirmation prompt")]
        yes: bool,
    },
}

pub fn handle_sector_command_with_conn(
    conn: &mut SqliteConnection,
    action: SectorAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SectorAction::Ls { unit } => {
            sector_ls_impl(conn, unit.as_deref())?;
        }
        SectorAction::Add { unit, name } => {
            sector_add_impl(conn, &unit, &name)?;
        }
        SectorAction::Rm { id, yes } => {
            sector_rm_impl(conn, id, yes)?;
        }
    }
    Ok(())
}

pub fn sector_ls_impl(
    conn: &mut SqliteConnection,
    unit: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sectors = match unit {
        Some(unit) => {
            let unit_id = resolve_unit_id(conn, unit)?;
            let unit_name = get_unit(conn, unit_id)?
                .map(|unit| unit.name)
                .unwrap_or_default();
            list_sectors_for_unit(conn, unit_id)?
                .into_iter()
                .map(|sector| (sector, unit_name.clone()))
                .collect::<Vec<_>>()
        }
        None => list_all_sectors(conn)?,
    };

    if sectors.is_empty() {
        println!("No sectors found.");
    } else {
        println!("Sectors:");
        for (sector, unit_name) in sectors {
            println!(
                "  ID: {}, Name: {}, Unit: {} (ID: {})",
                sector.id, sector.name, unit_name, sector.unit_id
            );
        }
    }

    Ok(())
}

pub fn sector_add_impl(
    conn: &mut SqliteConnection,
    unit: &str,
    name: &str,
) -> Result<Sector, Box<dyn std::error::Error>> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Sector name cannot be empty".into());
    }
    let unit_id = resolve_unit_id(conn, unit)?;
    if list_sectors_for_unit(conn, unit_id)?
        .iter()
        .any(|sector| sector.name == name)
    {
        return Err(format!("Sector '{}' already exists in that unit", name).into());
    }

    let sector = insert_sector(conn, unit_id, name)?;
    println!("Sector created successfully!");
    println!("ID: {}", sector.id);
    println!("Name: {}", sector.name);
    println!("Unit ID: {}", sector.unit_id);
    Ok(sector)
}

/// Returns whether the sector was deleted. A sector referenced by tickets
/// cannot be removed.
pub fn sector_rm_impl(
    conn: &mut SqliteConnection,
    sector_id: i32,
    yes: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let sector = get_sector(conn, sector_id)?
        .ok_or_else(|| format!("Sector with ID {} does not exist", sector_id))?;

    if !yes && !confirm(&format!("Are you sure you want to delete sector '{}'?", sector.name))? {
        println!("Operation cancelled.");
        return Ok(false);
    }

    delete_sector(conn, sector.id).map_err(|e| {
        format!("Failed to delete sector {} (ID: {}): {}", sector.name, sector.id, e)
    })?;
    println!("Deleted sector: {} (ID: {})", sector.name, sector.id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use helpdesk_api::models::Role;
    use helpdesk_api::orm::testing::{insert_test_ticket, insert_test_user, setup_test_db};
    use helpdesk_api::orm::unit::insert_unit;

    use super::*;

    #[test]
    fn add_resolves_unit_by_name() {
        let mut conn = setup_test_db();
        let unit = insert_unit(&mut conn, "Unidade Central").unwrap();

        let sector = sector_add_impl(&mut conn, "unidade central", "Almoxarifado").unwrap();
        assert_eq!(sector.unit_id, unit.id);

        assert!(sector_add_impl(&mut conn, "Unidade Central", "Almoxarifado").is_err());
        assert!(sector_add_impl(&mut conn, "Unidade Sul", "Almoxarifado").is_err());
    }

    #[test]
    fn remove_deletes_unused_sector() {
        let mut conn = setup_test_db();
        let unit = insert_unit(&mut conn, "Unidade Norte").unwrap();
        let sector = insert_sector(&mut conn, unit.id, "Recepção").unwrap();

        assert!(sector_rm_impl(&mut conn, sector.id, true).unwrap());
        assert!(get_sector(&mut conn, sector.id).unwrap().is_none());
        assert!(sector_rm_impl(&mut conn, sector.id, true).is_err());
    }

    #[test]
    fn sector_in_use_is_kept() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        assert!(sector_rm_impl(&mut conn, ticket.sector_id, true).is_err());
        assert!(get_sector(&mut conn, ticket.sector_id).unwrap().is_some());
    }
}
