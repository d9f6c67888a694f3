use actix_web::{http::header, HttpRequest};

/// Bearer token from the `Authorization` header, if there is one.
pub fn get_token(req: &HttpRequest) -> Option<String> {
    let auth = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = auth.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => {
            Some(token.to_string())
        }
        _ => None,
    }
}
