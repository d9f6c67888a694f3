use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::blocking;
use crate::{
    auth::RequestContext,
    errors::ServerError,
    models::note::{PinRequest, ReorderRequest, ReqNote},
    order, AppState,
};

fn missing_fields() -> ServerError {
    ServerError::InvalidArgument("Missing required fields".to_string())
}

pub async fn update(
    ctx: RequestContext,
    note_id: web::Path<String>,
    input: web::Json<ReqNote>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let content = input.into_inner().validate()?;
    let store = env.notes.clone();
    let note_id = note_id.into_inner();

    let note = blocking(move || {
        store
            .update_content(ctx.user_id(), &note_id, &content)?
            .ok_or(ServerError::NotFound(note_id))
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!(note)))
}

pub async fn del(
    ctx: RequestContext,
    note_id: web::Path<String>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let store = env.notes.clone();
    let note_id = note_id.into_inner();

    blocking(move || order::remove(store.as_ref(), &ctx, &note_id)).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Note deleted successfully" })))
}

pub async fn reorder(
    ctx: RequestContext,
    input: web::Json<ReorderRequest>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let ReorderRequest {
        note_id,
        new_order,
        pinned,
    } = input.into_inner();
    let (note_id, new_order) = match (note_id, new_order) {
        (Some(note_id), Some(new_order)) if !note_id.is_empty() => (note_id, new_order),
        _ => return Err(missing_fields()),
    };
    let store = env.notes.clone();

    blocking(move || {
        // a drop into the other group is a pin toggle, not a move
        if let Some(target_group) = pinned {
            let current = store
                .find_order_and_pinned(ctx.user_id(), &note_id)?
                .ok_or_else(|| ServerError::NotFound(note_id.clone()))?;
            if current.pinned != target_group {
                return Err(ServerError::InvalidArgument(
                    "Cannot move a note across pin groups".to_string(),
                ));
            }
        }

        order::reorder(store.as_ref(), &ctx, &note_id, new_order)
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn pin(
    ctx: RequestContext,
    note_id: web::Path<String>,
    input: web::Json<PinRequest>,
    env: web::Data<AppState>,
) -> Result<HttpResponse, ServerError> {
    let pinned = input.into_inner().pinned.ok_or_else(missing_fields)?;
    let store = env.notes.clone();
    let note_id = note_id.into_inner();

    let note =
        blocking(move || order::set_pinned(store.as_ref(), &ctx, &note_id, pinned)).await?;

    Ok(HttpResponse::Ok().json(json!(note)))
}
