pub mod error;
pub mod postgres;
pub mod records;
pub mod store;

#[cfg(feature = "memory")]
pub mod memory;

pub use error::{DbError, DbResult};
pub use postgres::PgStore;
pub use records::*;
pub use store::*;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
