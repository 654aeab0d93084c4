pub mod attachment;
pub mod comment;
mod db;
pub mod login;
pub mod notification;
pub mod report;
pub mod session;
#[cfg(any(test, feature = "test-staging"))]
pub mod testing;
pub mod ticket;
pub mod unit;
pub mod user;

pub use db::*;
