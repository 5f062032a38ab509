//! Session credentials for the medkit API
//!
//! Owns the two bearer tokens a signed-in user holds and the single network
//! call that renews them. The request-level coordination (attaching tokens,
//! reacting to 401, queuing during refresh) lives in `medkit-client`; this
//! crate has no knowledge of it and can be used on its own.
//!
//! Credential flow:
//! 1. Client logs in and stores the returned pair via `TokenStore::set()`
//! 2. Every request reads the access token from the store
//! 3. On 401 the client calls `token::refresh_token()` with the refresh token
//! 4. The renewed pair replaces the old one via `TokenStore::set()`
//! 5. Logout or an irrecoverable failure calls `TokenStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::{Error, Result};
pub use token::{TokenResponse, refresh_token};
