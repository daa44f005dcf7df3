use crate::error::AppError;
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use uuid::Uuid;

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    // 仅 GET 公开（浏览扭蛋机与抽签）
    read_prefix_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec!["/swagger-ui", "/swagger-ui/", "/api-docs/openapi.json"],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/v1/auth/"],
            read_prefix_paths: vec!["/api/v1/gachas", "/api/v1/raffles"],
            // 即使在公开前缀下也需要认证
            excluded_paths: vec!["/api/v1/auth/me"],
        }
    }

    fn is_public_path(&self, method: &Method, path: &str) -> bool {
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

        if self
            .prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
        {
            return true;
        }

        *method == Method::GET
            && self
                .read_prefix_paths
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
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let verified = token
            .as_deref()
            .map(|token| self.jwt_service.verify_access_token(token));

        let is_public = self.public_paths.is_public_path(req.method(), req.path());

        match verified {
            Some(Ok(claims)) => match claims.user_id() {
                Ok(user_id) => {
                    // 将用户ID添加到请求扩展中
                    req.extensions_mut().insert(user_id);
                    Box::pin(self.service.call(req))
                }
                Err(e) if !is_public => Box::pin(async move { Err(e.into()) }),
                Err(_) => Box::pin(self.service.call(req)),
            },
            // 公开路由遇到无效令牌时按匿名访问处理
            _ if is_public => Box::pin(self.service.call(req)),
            Some(Err(_)) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 用于获取当前用户ID的辅助函数
pub fn get_current_user_id(req: &HttpRequest) -> Option<Uuid> {
    req.extensions().get::<Uuid>().copied()
}
