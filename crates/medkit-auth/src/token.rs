//! Token refresh call
//!
//! The refresh request is sent with a bare `reqwest::Client`, outside the
//! authenticated client: it must never carry the expired bearer token and
//! must never be intercepted by the refresh protocol itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{REFRESH_PATH, api_url};
use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Response body of both login and refresh.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .finish()
    }
}

impl TokenResponse {
    /// The pair to persist.
    pub fn credential_pair(&self) -> CredentialPair {
        CredentialPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange a refresh token for a new credential pair.
///
/// 401/403 from the server maps to `InvalidCredentials`; any other failure,
/// including transport errors, maps to `Http` or `TokenExchange`. The caller
/// treats all of them as terminal for the session.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let url = api_url(base_url, REFRESH_PATH);
    debug!(url, "requesting token refresh");

    let response = client
        .post(&url)
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: axum::Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn token_response_reads_server_json() {
        let json = r#"{
            "accessToken": "A2",
            "refreshToken": "R2",
            "tokenType": "Bearer",
            "userId": 42,
            "username": "anna",
            "email": "anna@example.com"
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(token.refresh_token, "R2");
        assert_eq!(token.user_id, Some(42));
        assert_eq!(token.credential_pair(), CredentialPair::new("A2", "R2"));
    }

    #[test]
    fn token_response_debug_hides_tokens() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"accessToken":"eyJ.access","refreshToken":"rt-secret","username":"anna"}"#,
        )
        .unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("eyJ.access"), "got: {debug}");
        assert!(!debug.contains("rt-secret"), "got: {debug}");
        assert!(debug.contains("anna"));
    }

    #[test]
    fn token_response_tolerates_bare_pair() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"accessToken":"A2","refreshToken":"R2"}"#).unwrap();
        assert!(token.token_type.is_none());
        assert!(token.email.is_none());
    }

    #[tokio::test]
    async fn refresh_posts_refresh_token_and_returns_new_pair() {
        let router = axum::Router::new().route(
            "/api/auth/refresh",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["refreshToken"], "R1");
                Json(serde_json::json!({"accessToken": "A2", "refreshToken": "R2"}))
            }),
        );
        let base = serve(router).await;

        let token = refresh_token(&reqwest::Client::new(), &base, "R1")
            .await
            .unwrap();
        assert_eq!(token.access_token, "A2");
        assert_eq!(token.refresh_token, "R2");
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_invalid_credentials() {
        let router = axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async { (StatusCode::UNAUTHORIZED, "expired") }),
        );
        let base = serve(router).await;

        let err = refresh_token(&reqwest::Client::new(), &base, "R1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn server_error_is_token_exchange_failure() {
        let router = axum::Router::new().route(
            "/api/auth/refresh",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(router).await;

        let err = refresh_token(&reqwest::Client::new(), &base, "R1")
            .await
            .unwrap_err();
        match err {
            Error::TokenExchange(msg) => assert!(msg.contains("500"), "got: {msg}"),
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = refresh_token(&reqwest::Client::new(), &format!("http://{addr}"), "R1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err:?}");
    }
}
