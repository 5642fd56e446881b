pub mod search_service;
pub mod user_service;

pub use search_service::{HttpSearchProvider, SearchProvider, SearchService, SearchServiceError};
pub use user_service::{UserService, UserServiceError};
