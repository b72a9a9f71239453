pub mod models;
pub mod repository;
pub mod store;

pub use models::*;
pub use repository::*;
pub use store::{LockKey, Store};

/// Unique-constraint violations are how the store reports a lost race on a
/// uniquely keyed insert.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
