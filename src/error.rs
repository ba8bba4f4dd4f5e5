use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::service::ServiceError;
use crate::store::StoreError;

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Denied(_) => StatusCode::CONFLICT,
            ServiceError::InvalidInput(_) | ServiceError::PhotoRefTooLong(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ServiceError::Denied(denial) => json!({
                "success": false,
                "code": denial.code(),
                "message": denial.to_string(),
            }),
            ServiceError::InvalidInput(_) | ServiceError::PhotoRefTooLong(_) => json!({
                "success": false,
                "code": "INVALID_INPUT",
                "message": self.to_string(),
            }),
            ServiceError::Store(StoreError::NotFound(what)) => json!({
                "success": false,
                "code": "NOT_FOUND",
                "message": format!("{what} not found"),
            }),
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Storage failure");
                json!({
                    "success": false,
                    "code": "INTERNAL",
                    "message": "Internal Server Error",
                })
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
