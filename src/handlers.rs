use actix_web::{web, HttpResponse};

use crate::errors::ServerError;

pub mod note;
pub mod token;

/// Runs a store call on the blocking pool so diesel I/O never stalls the
/// request workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await?
}

pub async fn index() -> impl actix_web::Responder {
    HttpResponse::Ok().finish()
}

/// Body errors (missing body, bad JSON, wrong field types) are all a 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ServerError::InvalidArgument(format!("Invalid request body: {err}")).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(index))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(token::register))
                .route("/login", web::post().to(token::login))
                .route("/verify", web::post().to(token::verify)),
        )
        .service(
            web::scope("/notes")
                .route("", web::get().to(note::query::list))
                .route("", web::post().to(note::post::new))
                // before "/{id}" so it is not taken for a note id
                .route("/reorder", web::put().to(note::mutate::reorder))
                .route("/{id}", web::get().to(note::query::get))
                .route("/{id}", web::put().to(note::mutate::update))
                .route("/{id}", web::delete().to(note::mutate::del))
                .route("/{id}/pin", web::put().to(note::mutate::pin)),
        );
}
