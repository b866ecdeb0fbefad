// Token codec: bearer JWTs plus opaque refresh values
// Decision: HS256 only (symmetric key); any other algorithm is rejected before claims are read
// Decision: Bearer tokens are trusted without a storage lookup; refresh values are stored (hashed) in DB

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::config::JwtConfig;

/// Bytes of entropy in a refresh value (256 bits)
const REFRESH_TOKEN_BYTES: usize = 32;

/// Why a bearer token was rejected (or could not be produced)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signature mismatch, or a signing algorithm other than HS256
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token could not be parsed or is missing required claims
    #[error("malformed token")]
    Malformed,

    /// Token was valid but `exp` has passed
    #[error("token expired")]
    Expired,

    /// Encoding failed; a configuration fault, never the caller's
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// JWT claims for access (bearer) tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Identity ID
    pub user_id: i64,
    /// Identity email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// A freshly signed bearer token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless issuer/verifier for bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        Self {
            issuer: config.issuer.clone(),
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issue a bearer token valid for `ttl` from now
    pub fn issue(
        &self,
        user_id: i64,
        email: &str,
        ttl: std::time::Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(Utc::now(), user_id, email, ttl)
    }

    /// Issue a bearer token as if the current time were `now`
    pub(crate) fn issue_at(
        &self,
        now: DateTime<Utc>,
        user_id: i64,
        email: &str,
        ttl: std::time::Duration,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = Duration::from_std(ttl).map_err(|e| TokenError::Signing(e.to_string()))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))?;

        let claims = AccessTokenClaims {
            user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate and decode a bearer token
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        match decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) => Ok(token_data.claims),
            // `alg: none` and other unknown names fail header parsing, not the algorithm check
            Err(e) if matches!(e.kind(), ErrorKind::Json(_)) && names_unknown_algorithm(token) => {
                Err(TokenError::InvalidSignature)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// True if the token header is readable JSON whose `alg` is not a supported algorithm
fn names_unknown_algorithm(token: &str) -> bool {
    let Some(header) = token.split('.').next() else {
        return false;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(header) else {
        return false;
    };
    let Ok(header) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return false;
    };

    header
        .get("alg")
        .and_then(|alg| alg.as_str())
        .is_some_and(|alg| alg.parse::<Algorithm>().is_err())
}

/// Generate an opaque refresh value: 256 bits from the OS CSPRNG, base64url
pub fn generate_refresh_token() -> String {
    random_token(REFRESH_TOKEN_BYTES)
}

/// Random base64url string of `len` bytes of entropy
pub(crate) fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token for database storage (using SHA-256)
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(token.as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            ..JwtConfig::default()
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&test_config())
    }

    #[test]
    fn test_issue_then_verify_round_trip() {
        let codec = codec();
        let issued = codec
            .issue(42, "test@example.com", StdDuration::from_secs(1))
            .unwrap();

        assert!(!issued.token.is_empty());

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.iss, "tasktrack");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 1);
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let issued_long_ago = Utc::now() - Duration::minutes(21);
        let issued = codec
            .issue_at(issued_long_ago, 1, "a@b.com", StdDuration::from_secs(20 * 60))
            .unwrap();

        assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_valid_until_expiry() {
        let codec = codec();
        // Issued 19 minutes ago with a 20 minute lifetime: still inside the window
        let issued = codec
            .issue_at(
                Utc::now() - Duration::minutes(19),
                1,
                "a@b.com",
                StdDuration::from_secs(20 * 60),
            )
            .unwrap();

        assert!(codec.verify(&issued.token).is_ok());
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();
        assert_eq!(codec.verify("invalid-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let other = TokenCodec::new(&JwtConfig {
            secret: "another-secret".to_string(),
            ..JwtConfig::default()
        });
        let issued = other
            .issue(1, "a@b.com", StdDuration::from_secs(60))
            .unwrap();

        assert_eq!(codec().verify(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_tampered_payload_is_invalid_signature() {
        let codec = codec();
        let issued = codec.issue(1, "a@b.com", StdDuration::from_secs(60)).unwrap();
        let victim = codec.issue(2, "b@b.com", StdDuration::from_secs(60)).unwrap();

        // Splice the victim's payload onto the first token's signature
        let parts: Vec<&str> = issued.token.split('.').collect();
        let victim_parts: Vec<&str> = victim.token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], victim_parts[1], parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let config = test_config();
        let now = Utc::now();
        let claims = AccessTokenClaims {
            user_id: 1,
            email: "a@b.com".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(5)).timestamp(),
            iss: config.issuer.clone(),
        };
        // Same secret, different HMAC variant
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec().verify(&token), Err(TokenError::InvalidSignature));
    }

    fn forge_with_header(header: &str) -> String {
        let issued = codec().issue(1, "a@b.com", StdDuration::from_secs(60)).unwrap();
        let payload = issued.token.split('.').nth(1).unwrap().to_string();
        format!("{}.{}.", URL_SAFE_NO_PAD.encode(header), payload)
    }

    #[test]
    fn test_alg_none_rejected() {
        let codec = codec();
        for header in [
            r#"{"alg":"none","typ":"JWT"}"#,
            r#"{"alg":"None"}"#,
            r#"{"alg":"HS1024"}"#,
        ] {
            assert_eq!(
                codec.verify(&forge_with_header(header)),
                Err(TokenError::InvalidSignature),
                "{}",
                header
            );
        }
    }

    #[test]
    fn test_header_without_alg_is_malformed() {
        let codec = codec();
        assert_eq!(
            codec.verify(&forge_with_header(r#"{"typ":"JWT"}"#)),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            codec.verify(&forge_with_header("not json")),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_lifetime_past_calendar_range_is_signing_error() {
        // Fits in a chrono Duration but lands beyond the last representable date
        let ttl = StdDuration::from_secs(300_000 * 365 * 24 * 60 * 60);
        assert!(matches!(
            codec().issue(1, "a@b.com", ttl),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let foreign = TokenCodec::new(&JwtConfig {
            issuer: "someone-else".to_string(),
            ..test_config()
        });
        let issued = foreign
            .issue(1, "a@b.com", StdDuration::from_secs(60))
            .unwrap();

        assert_eq!(codec().verify(&issued.token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_refresh_token_entropy_and_encoding() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();

        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_hash_token() {
        let token = "test-token-123";
        let hash1 = hash_token(token);
        let hash2 = hash_token(token);

        // Same input produces same hash
        assert_eq!(hash1, hash2);

        // SHA-256 produces 64 hex characters
        assert_eq!(hash1.len(), 64);
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash1, hash_token("test-token-124"));
    }
}
