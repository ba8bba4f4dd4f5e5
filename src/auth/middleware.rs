use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    value
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must start with Bearer")
}

fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthUser, &'static str> {
    let claims = verify_token(bearer_token(headers)?, secret)
        .map_err(|_| "Invalid or expired token")?;
    AuthUser::try_from(claims)
}

/// Resolves the bearer token into an `AuthUser` request extension, or answers 401.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    match authenticate(req.headers(), &config.jwt_secret) {
        Ok(user) => {
            tracing::debug!(user_id = user.user_id, role = ?user.role, "Authenticated");
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(reason) => {
            tracing::debug!(path = %req.path(), reason, "Rejected unauthenticated request");
            let resp = HttpResponse::Unauthorized().json(json!({"error": reason}));
            Ok(req.into_response(resp.map_into_boxed_body()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use actix_web::http::header::HeaderValue;

    const SECRET: &str = "middleware-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(
            bearer_token(&headers("Basic abc")),
            Err("Authorization header must start with Bearer")
        );
        assert_eq!(bearer_token(&HeaderMap::new()), Err("Missing Authorization header"));
    }

    #[test]
    fn test_authenticate_checks_signature_and_role() {
        let good = generate_access_token(7, "amy".into(), 3, Some(1001), SECRET, 300).unwrap();
        let user = authenticate(&headers(&format!("Bearer {good}")), SECRET).unwrap();
        assert_eq!(user.employee_id, Some(1001));

        assert_eq!(
            authenticate(&headers(&format!("Bearer {good}")), "other-secret").unwrap_err(),
            "Invalid or expired token"
        );

        let unknown_role = generate_access_token(7, "amy".into(), 9, None, SECRET, 300).unwrap();
        assert_eq!(
            authenticate(&headers(&format!("Bearer {unknown_role}")), SECRET).unwrap_err(),
            "Invalid role"
        );
    }
}
