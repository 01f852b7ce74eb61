//! Repositories for database operations

pub mod session;

pub use session::SessionRepository;
