//! Portal token management
//!
//! Issues and verifies the short-lived HS256 tokens used to
//! authenticate portal calls after login.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// 令牌有效期：登录后 12 小时
const TOKEN_LIFETIME_HOURS: i64 = 12;

/// Token claims: the user's email plus expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct PortalClaims {
    pub email: String,
    pub exp: i64,
}

/// HS256 token issuer bound to the configured signing key.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(signing_key: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_key.as_bytes()),
            validation,
        }
    }

    /// Issue a token for the given user email.
    pub fn issue(&self, email: &str) -> Result<String> {
        let claims = PortalClaims {
            email: email.to_string(),
            exp: (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ProxyError::internal_with_source("签发门户令牌失败", e))
    }

    /// Verify a token and return the email it was issued for.
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<PortalClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                ProxyError::abort(
                    403,
                    format!("Access denied: {e} -- please authenticate using a valid token."),
                )
            })?;
        Ok(data.claims.email)
    }
}
