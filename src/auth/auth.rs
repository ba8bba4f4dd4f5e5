use crate::model::{EmployeeId, role::Role};
use crate::models::Claims;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<EmployeeId>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    /// Resolved once by `auth_middleware`; a route outside it has no caller.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Not authenticated")),
        )
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = Role::from_id(claims.role).ok_or("Invalid role")?;
        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    /// The caller's employee id; attendance endpoints act only on the caller.
    pub fn require_employee(&self) -> actix_web::Result<EmployeeId> {
        self.employee_id
            .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn hr() -> AuthUser {
        AuthUser {
            user_id: 7,
            username: "hr".into(),
            role: Role::Hr,
            employee_id: None,
        }
    }

    #[actix_web::test]
    async fn test_extractor_needs_resolved_user() {
        // a bearer header alone is not enough without the middleware
        let (req, mut payload) = TestRequest::default()
            .insert_header(("Authorization", "Bearer whatever"))
            .to_http_parts();
        let err = AuthUser::from_request(&req, &mut payload).await.unwrap_err();
        assert_eq!(
            err.error_response().status(),
            actix_web::http::StatusCode::UNAUTHORIZED
        );

        let (req, mut payload) = TestRequest::default().to_http_parts();
        req.extensions_mut().insert(hr());
        let user = AuthUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(user.role, Role::Hr);
        assert!(user.require_hr_or_admin().is_ok());
        assert!(user.require_admin().is_err());
        assert!(user.require_employee().is_err());
    }
}
