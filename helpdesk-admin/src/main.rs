//! Help desk administration CLI.
//!
//! Operates directly on the SQLite database named by `DATABASE_URL`, using the
//! ORM functions of `helpdesk-api`. Users, units and sectors are only ever
//! created here; the HTTP API has no endpoints for them.
//!
//! Listings and removals take a search term that is a regex by default or a
//! plain substring with `-F`. Destructive commands ask for confirmation
//! unless `-y` is given.

use clap::{Parser, Subcommand};

mod admin_cli;

use admin_cli::{
    sector_commands::{SectorAction, handle_sector_command_with_conn},
    unit_commands::{UnitAction, handle_unit_command_with_conn},
    user_commands::{UserAction, handle_user_command_with_conn},
    utils::establish_connection,
};

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Parser)]
#[command(name = "helpdesk-admin")]
#[command(about = "Administration tool for the help desk database")]
#[command(version)]
struct Cli {
    /// Show extended version information
    #[arg(long, action = clap::ArgAction::SetTrue)]
    version_info: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Manage users")]
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    #[command(about = "Manage units")]
    Unit {
        #[command(subcommand)]
        action: UnitAction,
    },
    #[command(about = "Manage sectors")]
    Sector {
        #[command(subcommand)]
        action: SectorAction,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.version_info {
        println!("helpdesk-admin {}", built_info::PKG_VERSION);
        println!("Built: {}", built_info::BUILT_TIME_UTC);
        if let Some(commit) = built_info::GIT_COMMIT_HASH {
            println!("Git commit: {}", commit);
        }
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("No command given. Run with --help for usage.");
        std::process::exit(2);
    };

    if let Err(e) = run(command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = establish_connection()?;
    match command {
        Commands::User { action } => handle_user_command_with_conn(&mut conn, action),
        Commands::Unit { action } => handle_unit_command_with_conn(&mut conn, action),
        Commands::Sector { action } => handle_sector_command_with_conn(&mut conn, action),
    }
}
