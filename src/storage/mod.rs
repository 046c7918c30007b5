mod feeds;
mod schema;
mod snapshots;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, StoredSnapshot};
