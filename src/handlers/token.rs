use actix_web::{web, HttpResponse};
use serde_derive::Deserialize;
use serde_json::json;

use super::blocking;
use crate::{
    auth::{issue_token, verify_token},
    errors::ServerError,
    models::user::{Credentials, User},
    AppState,
};

#[derive(Clone, Deserialize)]
pub struct TokenReq {
    token: String,
}

pub async fn verify(
    body: web::Json<TokenReq>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    match verify_token(&env, &body.token) {
        Ok(_) => Ok(HttpResponse::Ok().finish()),
        Err(_) => Ok(HttpResponse::Unauthorized().finish()),
    }
}

pub async fn register(
    body: web::Json<Credentials>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let (email, password, name) = body.into_inner().required()?;
    let users = env.users.clone();

    let user = blocking(move || {
        let user = User::new(email, name, &password)?;
        users.insert_user(&user)?;
        Ok(user)
    })
    .await?;
    log::info!("registered user {}", user.id);

    Ok(HttpResponse::Created().json(json!({ "token": issue_token(&env, &user.id)? })))
}

pub async fn login(
    body: web::Json<Credentials>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let (email, password, _) = body.into_inner().required()?;
    let users = env.users.clone();

    let user = blocking(move || match users.find_by_email(&email)? {
        Some(user) if user.verify_password(&password)? => Ok(user),
        _ => Err(ServerError::Unauthorized),
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "token": issue_token(&env, &user.id)? })))
}
