use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::blocking;
use crate::{
    auth::RequestContext, errors::ServerError, models::note::ReqNote, order, AppState,
};

pub async fn new(
    ctx: RequestContext,
    input: web::Json<ReqNote>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let content = input.into_inner().validate()?;
    let store = env.notes.clone();

    let note = blocking(move || order::create(store.as_ref(), &ctx, content)).await?;
    log::debug!("created note {} at order {}", note.id, note.sort_order);

    Ok(HttpResponse::Created().json(json!(note)))
}
