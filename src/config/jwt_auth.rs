use crate::error::PoolError;
use crate::model::token_claims::TokenClaims;
use crate::model::UserId;
use crate::AppState;
use actix_web::{dev::Payload, web, Error as ActixWebError};
use actix_web::{http, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::future::{ready, Ready};

pub const ADMIN_ROLE: &str = "admin";

/// The caller identified by a valid HS256 token from the `token` cookie or a bearer header.
#[derive(Debug, Clone)]
pub struct JwtMiddleware {
    pub user_id: UserId,
    pub role: Option<String>,
}

impl JwtMiddleware {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    pub fn require_admin(&self) -> Result<(), PoolError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PoolError::Forbidden(
                "This operation is reserved for pool administrators".to_string(),
            ))
        }
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.cookie("token")
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get(http::header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|token| token.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<JwtMiddleware, PoolError> {
    let data = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| PoolError::Persistence("application state is not configured".to_string()))?;

    let token = bearer_token(req).ok_or_else(|| {
        PoolError::Authentication("You are not logged in, please provide token".to_string())
    })?;

    let claims = decode::<TokenClaims>(
        &token,
        &DecodingKey::from_secret(data.config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| PoolError::Authentication("Invalid token".to_string()))?
    .claims;

    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| PoolError::Authentication("Invalid token subject".to_string()))?;

    Ok(JwtMiddleware {
        user_id,
        role: claims.role,
    })
}

impl FromRequest for JwtMiddleware {
    type Error = ActixWebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(ActixWebError::from))
    }
}
