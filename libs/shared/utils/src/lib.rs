pub mod extractor;
pub mod jwt;
pub mod pagination;
pub mod session;
pub mod signing;
pub mod state;
pub mod test_utils;

pub use extractor::auth_middleware;
pub use state::AppState;
