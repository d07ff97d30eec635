pub mod backend;
pub mod config;
pub mod error;
pub mod phrases;
pub mod session;

// Re-export common error type
pub use error::ArcanaError;
