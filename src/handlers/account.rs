use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::error::AppError;
use crate::middlewares::get_current_user_id;
use crate::models::*;
use crate::services::AccountService;

#[utoipa::path(
    get,
    path = "/me/referrals",
    tag = "account",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取推荐列表成功", body = ReferralsResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn referrals(
    service: web::Data<AccountService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.referrals(user_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/me/rewards",
    tag = "account",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取积分与奖励成功", body = RewardsResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn rewards(service: web::Data<AccountService>, req: HttpRequest) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.rewards(user_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/me/rewards/{reward_id}/redeem",
    tag = "account",
    params(("reward_id" = String, Path, description = "奖励ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "兑换成功", body = RedeemRewardResponse),
        (status = 400, description = "积分不足"),
        (status = 401, description = "未授权"),
        (status = 404, description = "奖励不存在")
    )
)]
pub async fn redeem_reward(
    service: web::Data<AccountService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.redeem_reward(user_id, &path).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/me/analytics",
    tag = "account",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取统计成功", body = AnalyticsResponse),
        (status = 401, description = "未授权")
    )
)]
/// 个人统计：参与、消费、销售与中奖率
pub async fn analytics(
    service: web::Data<AccountService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.analytics(user_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}
