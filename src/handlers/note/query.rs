use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::blocking;
use crate::{auth::RequestContext, errors::ServerError, AppState};

pub async fn list(
    ctx: RequestContext,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let store = env.notes.clone();
    let notes = blocking(move || store.list_by_user(ctx.user_id())).await?;

    Ok(HttpResponse::Ok().json(json!(notes)))
}

pub async fn get(
    ctx: RequestContext,
    note_id: web::Path<String>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let store = env.notes.clone();
    let note_id = note_id.into_inner();

    let note = blocking(move || {
        store
            .find(ctx.user_id(), &note_id)?
            .ok_or(ServerError::NotFound(note_id))
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!(note)))
}
