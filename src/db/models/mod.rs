pub mod history;
pub mod user;

pub use history::{HistoryEntry, HistoryRecord};
pub use user::User;
