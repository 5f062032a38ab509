//! Shared building blocks for the medkit workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
