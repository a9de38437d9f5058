use std::env;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, web};
use anyhow::Context;
use chrono::{Duration, Utc};
use futures::future::{Ready, ready};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// JWT claims carried by every issued credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing secret and token lifetime; tokens are self-contained, so this is
/// the only auth state the server holds.
#[derive(Clone)]
pub struct AuthSettings {
    secret: String,
    token_ttl_minutes: i64,
}

impl AuthSettings {
    pub fn new(secret: String, token_ttl_minutes: i64) -> Self {
        Self {
            secret,
            token_ttl_minutes,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let token_ttl_minutes = match env::var("TOKEN_TTL_MINUTES") {
            Ok(raw) => raw.parse().context("TOKEN_TTL_MINUTES must be an integer")?,
            Err(_) => 30,
        };
        Ok(Self::new(secret, token_ttl_minutes))
    }

    /// Issues a signed bearer token for the given doctor email.
    pub fn issue_token(&self, email: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.token_ttl_minutes)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
    }

    /// Verifies signature and expiry; any failure collapses to
    /// `Unauthenticated` so callers learn nothing about why.
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthenticated)
    }
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST).map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
}

pub fn verify_password(plain: &str, hashed: &str) -> bool {
    // A malformed stored hash verifies as a mismatch.
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

/// Identity proven by a valid bearer token. Extracting this in a handler
/// signature is what gates the route: requests without a verifiable token
/// are rejected before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthedDoctor {
    pub email: String,
}

impl FromRequest for AuthedDoctor {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthedDoctor, ApiError> {
    let settings = req
        .app_data::<web::Data<AuthSettings>>()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("AuthSettings missing from app data")))?;
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;
    let claims = settings.verify_token(token)?;
    Ok(AuthedDoctor { email: claims.sub })
}
