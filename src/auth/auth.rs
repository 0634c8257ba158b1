use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::{Principal, Role};
use crate::models::TokenType;
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

/// Caller identity extracted from the bearer token.
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        if claims.token_type != TokenType::Access {
            return ready(Err(ErrorUnauthorized("Access token required")));
        }

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        }))
    }
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        match self.role {
            Role::Admin => Principal::admin(self.user_id),
            Role::Employee => Principal::employee(self.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::testing::{SECRET, token};
    use actix_web::test::TestRequest;

    async fn extract(authorization: Option<String>) -> Result<AuthUser, actix_web::Error> {
        let mut req = TestRequest::default().app_data(Data::new(Config::for_tests(SECRET)));
        if let Some(value) = authorization {
            req = req.insert_header(("Authorization", value));
        }
        let (req, mut payload) = req.to_http_parts();
        AuthUser::from_request(&req, &mut payload).await
    }

    #[actix_web::test]
    async fn admin_token_yields_admin_principal() {
        let user = extract(Some(format!("Bearer {}", token(3, 1, TokenType::Access))))
            .await
            .unwrap();
        assert_eq!(user.username, "user3");
        assert_eq!(user.principal(), Principal::admin(3));
    }

    #[actix_web::test]
    async fn rejects_missing_refresh_and_unknown_role_tokens() {
        assert!(extract(None).await.is_err());
        assert!(
            extract(Some(format!("Bearer {}", token(3, 2, TokenType::Refresh))))
                .await
                .is_err()
        );
        assert!(
            extract(Some(format!("Bearer {}", token(3, 9, TokenType::Access))))
                .await
                .is_err()
        );
        assert!(extract(Some(token(3, 2, TokenType::Access))).await.is_err());
    }
}
