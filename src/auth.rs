//! Service-account OAuth2: sign a one-hour RS256 assertion and trade it for
//! a bearer token. Every request re-authenticates; there is deliberately no
//! token cache, so nothing here outlives a single call.

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::credentials::ServiceAccount;
use crate::error::RelayError;

pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/earthengine.readonly";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    scope: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub async fn fetch_access_token(
    client: &reqwest::Client,
    token_url: &str,
    account: &ServiceAccount,
) -> Result<String, RelayError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: &account.client_email,
        sub: &account.client_email,
        aud: token_url,
        iat: now,
        exp: now + 3600,
        scope: READONLY_SCOPE,
    };

    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
    let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?;

    let res = client
        .post(token_url)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(RelayError::Authentication(format!("{status}: {body}")));
    }

    let token: TokenResponse = res.json().await?;
    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_pem_is_a_signing_error() {
        let key = EncodingKey::from_rsa_pem(b"not a key");
        assert!(key.is_err());
    }

    #[test]
    fn claims_serialize_with_scope() {
        let claims = Claims {
            iss: "a@b.c",
            sub: "a@b.c",
            aud: "https://oauth2.googleapis.com/token",
            iat: 0,
            exp: 3600,
            scope: READONLY_SCOPE,
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["scope"], READONLY_SCOPE);
        assert_eq!(value["exp"], 3600);
    }
}
