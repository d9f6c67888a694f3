//! Token issuing and the per-request identity of the caller.

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey};
use serde_derive::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{errors::ServerError, utils::get_token, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// The authenticated caller. Every note operation takes one of these instead
/// of reading who is asking from anywhere else.
#[derive(Clone, Debug)]
pub struct RequestContext {
    user_id: String,
}

impl RequestContext {
    pub fn new(user_id: String) -> Self {
        RequestContext { user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn issue_token(env: &AppState, user_id: &str) -> Result<String, ServerError> {
    let iat = now_secs();
    let claims = Claims {
        sub: user_id.to_owned(),
        iat,
        exp: iat + env.token_lifetime.as_secs(),
    };

    Ok(encode(
        &env.jwt_header,
        &claims,
        &EncodingKey::from_secret(env.secret.as_bytes()),
    )?)
}

pub fn verify_token(env: &AppState, token: &str) -> Result<Claims, ServerError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(env.secret.as_bytes()),
        &env.jwt_validator,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        log::debug!("rejected token: {e}");
        ServerError::Unauthorized
    })
}

fn authenticate(req: &HttpRequest) -> Result<RequestContext, ServerError> {
    let env = req
        .app_data::<web::Data<AppState>>()
        .ok_or(ServerError::EnvironmentError)?;
    let token = get_token(req).ok_or(ServerError::Unauthorized)?;
    let claims = verify_token(env, &token)?;
    Ok(RequestContext::new(claims.sub))
}

impl FromRequest for RequestContext {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn state() -> AppState {
        let store = Arc::new(MemoryStore::new());
        AppState::new("test-secret".into(), 3600, store.clone(), store)
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let env = state();
        let token = issue_token(&env, "user-1").unwrap();
        let claims = verify_token(&env, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let env = state();
        let mut other = state();
        other.secret = "another-secret".into();
        let token = issue_token(&other, "user-1").unwrap();

        assert!(matches!(
            verify_token(&env, &token),
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            verify_token(&env, "garbage"),
            Err(ServerError::Unauthorized)
        ));
    }
}
