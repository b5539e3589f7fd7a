use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, FromRequest, HttpMessage, HttpRequest,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// Typed identity of the current session, inserted into request extensions
/// by the middleware and consumed through the extractors below.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub is_admin: bool,
    pub must_set_password: bool,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthUser>().cloned();
        ready(match user {
            Some(user) => Ok(user),
            None => Err(AppError::AuthError("Authentication required".to_string()).into()),
        })
    }
}

/// Admin-gated identity: resolves like `AuthUser`, then requires the admin
/// flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<AuthUser>().cloned();
        ready(match user {
            Some(user) if user.is_admin => Ok(AdminUser(user)),
            Some(_) => Err(AppError::Forbidden.into()),
            None => Err(AppError::AuthError("Authentication required".to_string()).into()),
        })
    }
}

struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

/// Endpoints reachable while the session still has to set a password.
const PENDING_ALLOWED_PATHS: [&str; 3] = ["/auth/me", "/auth/set-password", "/auth/logout"];

fn pending_allowed(path: &str) -> bool {
    PENDING_ALLOWED_PATHS.contains(&path)
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/", "/health", "/api-docs/openapi.json"],
            prefix_paths: vec![
                "/swagger-ui",
                "/api-docs/",
                "/auth/",
                "/ref/",
                "/r/",
                "/api/referral/",
                "/api/display/",
            ],
            // Authenticated even though they sit under a public prefix.
            excluded_paths: vec!["/auth/logout", "/auth/me", "/auth/set-password"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        if self.exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight passes through untouched.
        if req.method() == Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let path = req.path();

        if self.public_paths.is_public_path(path) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let auth_header = req.headers().get("Authorization");

        let token = if let Some(auth_value) = auth_header {
            if let Ok(auth_str) = auth_value.to_str() {
                auth_str.strip_prefix("Bearer ")
            } else {
                None
            }
        } else {
            None
        };

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.jwt_service.verify_session_token(token) {
            Ok(claims) => {
                let user = AuthUser {
                    id: claims.sub.parse::<i64>().unwrap_or(0),
                    email: claims.email,
                    is_admin: claims.is_admin,
                    must_set_password: claims.must_set_password,
                };

                // OTP-verified sessions without a password reach only the
                // set-password whitelist.
                if user.must_set_password && !pending_allowed(req.path()) {
                    let error = AppError::PasswordSetupRequired;
                    return Box::pin(async move { Err(error.into()) });
                }

                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(_) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/auth/send-otp"));
        assert!(paths.is_public_path("/auth/verify-otp"));
        assert!(paths.is_public_path("/ref/ABCD1234"));
        assert!(paths.is_public_path("/r/welcome"));
        assert!(paths.is_public_path("/api/referral/signup"));
        assert!(paths.is_public_path("/api/display/events"));
        assert!(paths.is_public_path("/health"));

        assert!(!paths.is_public_path("/auth/logout"));
        assert!(!paths.is_public_path("/auth/me"));
        assert!(!paths.is_public_path("/auth/set-password"));
        assert!(!paths.is_public_path("/api/user/dashboard"));
        assert!(!paths.is_public_path("/admin/referrals"));
    }

    #[test]
    fn test_pending_sessions_reach_only_the_whitelist() {
        assert!(pending_allowed("/auth/me"));
        assert!(pending_allowed("/auth/set-password"));
        assert!(pending_allowed("/auth/logout"));

        assert!(!pending_allowed("/api/user/dashboard"));
        assert!(!pending_allowed("/api/user/referrals"));
        assert!(!pending_allowed("/admin/referrals"));
    }
}
