pub mod search_history_repository;
pub mod user_repository;

pub use search_history_repository::{SearchHistoryRepository, SqliteSearchHistoryRepository};
pub use user_repository::{RepositoryError, SqliteUserRepository, UserRepository};
