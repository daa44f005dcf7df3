use actix_web::{web, HttpRequest, HttpResponse, Result, ResponseError};
use serde_json::json;
use crate::error::AppError;
use crate::middlewares::get_current_user_id;
use crate::models::*;
use crate::services::AuthService;

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "注册成功", body = AuthResponse),
        (status = 400, description = "请求参数错误"),
        (status = 500, description = "服务器内部错误")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 401, description = "认证失败"),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "刷新令牌成功", body = AuthResponse),
        (status = 401, description = "无效的刷新令牌")
    )
)]
pub async fn refresh(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service.refresh_token(&request.refresh_token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "登出成功")
    )
)]
pub async fn logout() -> Result<HttpResponse> {
    // 令牌无状态，客户端丢弃即可
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out"
    })))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取当前用户成功", body = UserResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn me(auth_service: web::Data<AuthService>, req: HttpRequest) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match auth_service.me(user_id).await {
        Ok(user) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": user }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}
