use crate::core::{AppError, AppState};
use crate::entities::UserAccount;
use axum::{Error, body::Body, extract::Request, extract::State, http, http::Response, middleware::Next};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// struct che codifica il contenuto del token jwt
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub id: i64,
    pub username: String,
}

#[instrument(skip(secret), fields(username = %username, id = %id))]
pub fn encode_jwt(username: String, id: i64, secret: &str) -> Result<String, Error> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let expire: chrono::TimeDelta = Duration::hours(24);
    let exp: usize = (now + expire).timestamp() as usize;
    let iat: usize = now.timestamp() as usize;
    let claim = Claims {
        iat,
        exp,
        username,
        id,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        warn!("Failed to encode JWT token: {:?}", e);
        Error::new("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, Error> {
    debug!("Decoding JWT token");
    decode(
        jwt_token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Failed to decode JWT token: {:?}", e);
        Error::new("Error in decoding jwt token")
    })
}

/// Contratto del collaboratore identità: token firmato -> utente utilizzabile.
///
/// Usato sia dal middleware HTTP sia dall'handshake del gateway. Un token
/// valido per un utente cancellato o disattivato viene rifiutato.
#[instrument(skip(state, token))]
pub async fn verify_token(state: &AppState, token: &str) -> Result<UserAccount, AppError> {
    let token_data = decode_jwt(token, &state.jwt_secret)
        .map_err(|_| AppError::unauthorized("Unable to decode token"))?;

    let user = state
        .users
        .find_by_id(token_data.claims.id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = token_data.claims.id, "Token refers to unknown user");
            AppError::unauthorized("You are not an authorized user")
        })?;

    if !user.is_usable() {
        warn!(user_id = user.user_id, "Token refers to deleted or inactive user");
        return Err(AppError::unauthorized("You are not an authorized user"));
    }

    info!(user_id = user.user_id, "User authenticated");
    Ok(user)
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let auth_header = match req.headers().get(http::header::AUTHORIZATION) {
        Some(header) => header.to_str().map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::unauthorized("Invalid authorization header")
        })?,
        None => {
            warn!("Missing authorization header");
            return Err(AppError::unauthorized(
                "Please add the JWT token to the header",
            ));
        }
    };

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or_else(|| {
            warn!("Authorization header is not a bearer token");
            AppError::unauthorized("Expected a bearer token")
        })?;

    let current_user = verify_token(&state, token).await?;
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}
