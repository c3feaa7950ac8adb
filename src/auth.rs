use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    FromRequest, HttpMessage, HttpResponse,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use log::{log, Level};
use serde::{Deserialize, Serialize};
use std::{
    env,
    future::{ready, Ready},
    task::{Context, Poll},
};

lazy_static! {
    pub static ref SECURITY_ENABLED: bool = env::var("SECURITY_ENABLED")
        .map(|x| x.parse::<bool>().unwrap_or(true))
        .unwrap_or(true);
    static ref TOKEN_SECRET: Vec<u8> = env::var("POLLS_JWT_SECRET")
        .expect("POLLS_JWT_SECRET not set")
        .into_bytes();
}

const TOKEN_TTL_SECONDS: i64 = 60 * 60 * 24;

/// Token claims doubling as the authenticated-user extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    exp: i64,
    iat: i64,
}

pub fn mint_token(
    secret: &[u8],
    id: i32,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = User {
        id,
        username: username.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECONDS,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Mints a token with the process-wide secret; handlers use this after a
/// successful signup or login.
pub fn issue_token(id: i32, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    mint_token(&TOKEN_SECRET, id, username)
}

pub fn verify_token(secret: &[u8], token: &str) -> Option<User> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    match decode::<User>(token, &DecodingKey::from_secret(secret), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            log!(Level::Debug, "Token rejected: {}", e);
            None
        }
    }
}

/// Signup field validation. Returns the inline message to surface on the
/// first failing rule.
pub fn validate_signup(
    username: &str,
    password: &str,
    password_confirm: &str,
) -> Result<(), &'static str> {
    if username.len() > 150 {
        return Err("Username should not exceed 150 characters.");
    }
    if !crate::utils::is_valid_username(username) {
        return Err("Invalid username format.");
    }
    if password != password_confirm {
        return Err("The two password fields didn't match.");
    }
    if password.chars().count() < 8 {
        return Err("Password must contain at least 8 characters.");
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn bearer_token(req: &actix_web::HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.trim_start_matches("Bearer ").to_string())
}

impl FromRequest for User {
    type Error = actix_web::error::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        if let Some(user) = req.extensions().get::<User>().cloned() {
            return ready(Ok(user));
        }
        let user = bearer_token(req).and_then(|t| verify_token(&TOKEN_SECRET, &t));
        match user {
            Some(user) => ready(Ok(user)),
            None => ready(Err(actix_web::error::ErrorUnauthorized(""))),
        }
    }
}

#[doc(hidden)]
pub struct PollAuthService<S> {
    service: S,
    enabled: bool,
}

impl<S> Service<ServiceRequest> for PollAuthService<S>
where
    S: Service<
        ServiceRequest,
        Response = ServiceResponse<actix_web::body::BoxBody>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.enabled {
            let unauthorized = |req: ServiceRequest| -> Self::Future {
                Box::pin(async { Ok(req.into_response(HttpResponse::Unauthorized().finish())) })
            };

            let token = match req.headers().get("Authorization").map(|x| x.to_str()) {
                Some(Ok(x)) => x.trim_start_matches("Bearer ").to_string(),
                _ => return unauthorized(req),
            };

            match verify_token(&TOKEN_SECRET, &token) {
                Some(user) => {
                    req.extensions_mut().insert(user);
                }
                None => return unauthorized(req),
            }
        }
        let future = self.service.call(req);
        Box::pin(async move {
            let response = future.await?;
            Ok(response)
        })
    }
}

#[derive(Clone, Debug)]
pub struct PollAuth {
    enabled: bool,
}

impl PollAuth {
    pub fn enabled() -> Self {
        Self {
            enabled: *SECURITY_ENABLED,
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl<S> Transform<S, ServiceRequest> for PollAuth
where
    S: Service<
        ServiceRequest,
        Response = ServiceResponse<actix_web::body::BoxBody>,
        Error = actix_web::Error,
    >,
    S::Future: 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = actix_web::Error;
    type Transform = PollAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PollAuthService {
            service,
            enabled: self.enabled,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn minted_token_round_trips() {
        let token = mint_token(SECRET, 7, "alice").unwrap();
        let user = verify_token(SECRET, &token).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_token(SECRET, 7, "alice").unwrap();
        assert!(verify_token(b"other-secret", &token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = User {
            id: 7,
            username: "alice".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(verify_token(SECRET, &token).is_none());
    }

    #[test]
    fn signup_validation_messages() {
        assert!(validate_signup("alice", "password123", "password123").is_ok());
        assert_eq!(
            validate_signup("alice", "password123", "password124"),
            Err("The two password fields didn't match.")
        );
        assert_eq!(
            validate_signup("alice", "short", "short"),
            Err("Password must contain at least 8 characters.")
        );
        assert_eq!(
            validate_signup("", "password123", "password123"),
            Err("Invalid username format.")
        );
        assert_eq!(
            validate_signup(&"x".repeat(151), "password123", "password123"),
            Err("Username should not exceed 150 characters.")
        );
    }

    #[actix_web::test]
    async fn request_without_token_extracts_no_user() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        let user = Option::<User>::from_request(&req, &mut actix_web::dev::Payload::None)
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[actix_web::test]
    async fn middleware_inserted_user_is_extracted() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        let now = chrono::Utc::now().timestamp();
        req.extensions_mut().insert(User {
            id: 7,
            username: "alice".to_string(),
            iat: now,
            exp: now + 60,
        });
        let user = User::from_request(&req, &mut actix_web::dev::Payload::None)
            .await
            .unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
