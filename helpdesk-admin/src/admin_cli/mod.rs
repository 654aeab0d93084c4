pub mod sector_commands;
pub mod unit_commands;
pub mod user_commands;
pub mod utils;
