/// Core Module for dbsession
///
/// This module contains the fundamental components of the crate: the
/// database session layer and the shared error type used across it.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, SessionError};
