pub mod search_history;
pub mod user;

pub use search_history::{SearchHistoryEntry, SearchHistoryRow, SearchResult};
pub use user::User;
