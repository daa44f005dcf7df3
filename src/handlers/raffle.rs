use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middlewares::get_current_user_id;
use crate::models::*;
use crate::services::RaffleService;
use crate::utils::{PaginatedResponse, PaginationParams};

#[utoipa::path(
    get,
    path = "/raffles",
    tag = "raffle",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取抽签列表成功", body = PaginatedResponse<RaffleResponse>),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_raffles(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match service.list_raffles(&query, get_current_user_id(&req)).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/raffles",
    tag = "raffle",
    request_body = CreateRaffleRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建成功", body = RaffleResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_raffle(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    request: web::Json<CreateRaffleRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.create_raffle(user_id, request.into_inner()).await {
        Ok(raffle) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": raffle }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/raffles/{id}",
    tag = "raffle",
    params(("id" = Uuid, Path, description = "抽签ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取成功", body = RaffleResponse),
        (status = 404, description = "不存在")
    )
)]
pub async fn get_raffle(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service.get_raffle(*path, get_current_user_id(&req)).await {
        Ok(raffle) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": raffle }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/raffles/{id}/purchase",
    tag = "raffle",
    params(("id" = Uuid, Path, description = "抽签ID")),
    request_body = PurchaseNumbersRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购买成功", body = Purchase),
        (status = 400, description = "号码无效或已售出"),
        (status = 401, description = "未授权"),
        (status = 404, description = "不存在")
    )
)]
/// 购买号码
pub async fn purchase_numbers(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<PurchaseNumbersRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service
        .purchase_numbers(user_id, *path, request.into_inner())
        .await
    {
        Ok(purchase) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": purchase }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/raffles/{id}/draw",
    tag = "raffle",
    params(("id" = Uuid, Path, description = "抽签ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "开奖成功", body = RaffleResponse),
        (status = 400, description = "已开奖或无人购买"),
        (status = 403, description = "非创建者")
    )
)]
/// 开奖（仅创建者，且只能一次）
pub async fn draw_winner(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.draw_winner(user_id, *path).await {
        Ok(raffle) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": raffle }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/me/purchases",
    tag = "raffle",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取购买记录成功", body = PaginatedResponse<Purchase>),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_purchases(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.my_purchases(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/me/raffles",
    tag = "raffle",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取我的抽签成功", body = PaginatedResponse<RaffleResponse>),
        (status = 401, description = "未授权")
    )
)]
/// 我创建的抽签（含销量与收入）
pub async fn my_raffles(
    service: web::Data<RaffleService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.list_created_by(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn raffle_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/raffles")
            .route("", web::get().to(list_raffles))
            .route("", web::post().to(create_raffle))
            .route("/{id}", web::get().to(get_raffle))
            .route("/{id}/purchase", web::post().to(purchase_numbers))
            .route("/{id}/draw", web::post().to(draw_winner)),
    );
}
