// Storage layer for tasktrack
// Decision: Support both PostgreSQL (production) and in-memory (dev mode)
//
// - backend: StorageBackend enum dispatching to either implementation
// - repositories: PostgreSQL via sqlx
// - memory: HashMap-backed store for dev mode and tests
// - password: Argon2id hashing (the password-hashing collaborator)

pub mod backend;
pub mod error;
pub mod memory;
pub mod models;
pub mod password;
pub mod repositories;

pub use backend::StorageBackend;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDatabase;
pub use models::*;
pub use repositories::Database;
