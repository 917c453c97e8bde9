//! Shared types for the Strava CLI workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
