//! Fixed paths and storage keys shared by the client and the store

/// Prefix every REST path is mounted under (`<base_url>/api/...`)
pub const API_PREFIX: &str = "/api";

/// Login endpoint, relative to the API prefix
pub const LOGIN_PATH: &str = "/auth/login";

/// Registration endpoint, relative to the API prefix
pub const REGISTER_PATH: &str = "/auth/register";

/// Token refresh endpoint, relative to the API prefix
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Paths whose own 401 never triggers a refresh: a 401 there means bad
/// credentials or a dead refresh token, not an expired access token.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

/// Storage key of the access token in the persisted credential file
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the refresh token in the persisted credential file
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Build the absolute URL of an API path.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!("{}{API_PREFIX}{path}", base_url.trim_end_matches('/'))
}
