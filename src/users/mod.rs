pub mod memory;
pub mod repo;
pub mod repo_types;
mod seed;

pub use memory::MemoryUserStore;
pub use repo::{is_duplicate_email, DuplicateEmail, PgUserStore, UserStore};
pub use repo_types::{NewUser, ProfileUpdate, PublicUser, Role, User};
pub use seed::ensure_admin;
