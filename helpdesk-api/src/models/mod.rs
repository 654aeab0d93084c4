pub mod attachment;
pub mod comment;
pub mod notification;
pub mod session;
pub mod status_history;
pub mod ticket;
pub mod unit;
pub mod user;

// Re-export models for easier access
pub use attachment::*;
pub use comment::*;
pub use notification::*;
pub use session::*;
pub use status_history::*;
pub use ticket::*;
pub use unit::*;
pub use user::*;
