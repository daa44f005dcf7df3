use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::middlewares::get_current_user_id;
use crate::models::*;
use crate::services::GachaService;
use crate::utils::{PaginatedResponse, PaginationParams};

#[utoipa::path(
    get,
    path = "/gachas",
    tag = "gacha",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取扭蛋机列表成功", body = PaginatedResponse<GachaResponse>),
        (status = 401, description = "未授权")
    )
)]
/// 扭蛋机列表（推荐优先，其次按创建时间倒序）
pub async fn list_gachas(
    service: web::Data<GachaService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match service.list_gachas(&query, get_current_user_id(&req)).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/gachas",
    tag = "gacha",
    request_body = CreateGachaRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建成功", body = GachaResponse),
        (status = 400, description = "奖品或权重配置无效"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_gacha(
    service: web::Data<GachaService>,
    req: HttpRequest,
    request: web::Json<CreateGachaRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.create_gacha(user_id, request.into_inner()).await {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/gachas/pricing",
    tag = "gacha",
    request_body = TierWeights,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "价格建议", body = PricingResponse),
        (status = 400, description = "权重无效")
    )
)]
/// 按稀有度权重预估建议价格（创建前使用）
pub async fn preview_pricing(
    service: web::Data<GachaService>,
    weights: web::Json<TierWeights>,
) -> Result<HttpResponse> {
    match service.preview_pricing(&weights) {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/gachas/{id}",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取成功", body = GachaResponse),
        (status = 404, description = "不存在")
    )
)]
pub async fn get_gacha(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service.get_gacha(*path, get_current_user_id(&req)).await {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/gachas/{id}/prizes",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    request_body = NewPrize,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "添加奖品成功", body = GachaResponse),
        (status = 400, description = "超出奖品上限或配置无效"),
        (status = 403, description = "非创建者")
    )
)]
pub async fn add_prize(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    prize: web::Json<NewPrize>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.add_prize(user_id, *path, prize.into_inner()).await {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/gachas/{id}/prizes/{prize_id}",
    tag = "gacha",
    params(
        ("id" = Uuid, Path, description = "扭蛋机ID"),
        ("prize_id" = String, Path, description = "奖品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除奖品成功", body = GachaResponse),
        (status = 400, description = "删除后配置无法抽取"),
        (status = 403, description = "非创建者"),
        (status = 404, description = "奖品不存在")
    )
)]
pub async fn remove_prize(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    let (gacha_id, prize_id) = path.into_inner();
    match service.remove_prize(user_id, gacha_id, &prize_id).await {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/gachas/{id}/weights",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    request_body = UpdateTierWeightsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功", body = GachaResponse),
        (status = 400, description = "权重之和必须为100"),
        (status = 403, description = "非创建者")
    )
)]
pub async fn update_weights(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateTierWeightsRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service
        .update_tier_weights(user_id, *path, request.tier_weights)
        .await
    {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/gachas/{id}/featured",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    request_body = SetFeaturedRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "设置成功", body = GachaResponse),
        (status = 403, description = "需要管理员权限")
    )
)]
pub async fn set_featured(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<SetFeaturedRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.set_featured(user_id, *path, request.featured).await {
        Ok(gacha) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": gacha }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/gachas/{id}/play",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "抽取成功", body = PlayResponse),
        (status = 400, description = "没有剩余次数或配置无效"),
        (status = 401, description = "未授权"),
        (status = 404, description = "不存在")
    )
)]
/// 进行一次抽取，返回奖品、稀有度与是否播放庆祝效果
pub async fn play(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.play(user_id, *path).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/gachas/{id}/attempts",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取次数成功", body = AttemptStatusResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_attempts(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.attempts(user_id, *path).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/gachas/{id}/history",
    tag = "gacha",
    params(
        ("id" = Uuid, Path, description = "扭蛋机ID"),
        PaginationParams
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取抽取记录成功", body = PaginatedResponse<DrawResult>),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_history(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_current_user_id(&req) else {
        return Ok(AppError::AuthError("Missing access token".into()).error_response());
    };
    match service.history(user_id, *path, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/gachas/{id}/results",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "公开结果", body = PublicResultsResponse),
        (status = 403, description = "结果未公开")
    )
)]
pub async fn get_public_results(
    service: web::Data<GachaService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service
        .public_results(*path, get_current_user_id(&req))
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/gachas/{id}/pricing",
    tag = "gacha",
    params(("id" = Uuid, Path, description = "扭蛋机ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "价格建议", body = PricingResponse),
        (status = 404, description = "不存在")
    )
)]
pub async fn get_pricing(
    service: web::Data<GachaService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service.pricing(*path).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/me/gachas",
    tag = "gacha",
    params(PaginationParams),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我创建的扭蛋机", body = PaginatedResponse<GachaResponse>),
        (status = 401, description = "未授权")
    )
)]
pub async fn my_gachas(
    service: web::Data<GachaService>,
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

/// 路由配置
pub fn gacha_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/gachas")
            .route("", web::get().to(list_gachas))
            .route("", web::post().to(create_gacha))
            .route("/pricing", web::post().to(preview_pricing))
            .route("/{id}", web::get().to(get_gacha))
            .route("/{id}/prizes", web::post().to(add_prize))
            .route("/{id}/prizes/{prize_id}", web::delete().to(remove_prize))
            .route("/{id}/weights", web::put().to(update_weights))
            .route("/{id}/featured", web::put().to(set_featured))
            .route("/{id}/play", web::post().to(play))
            .route("/{id}/attempts", web::get().to(get_attempts))
            .route("/{id}/history", web::get().to(get_history))
            .route("/{id}/results", web::get().to(get_public_results))
            .route("/{id}/pricing", web::get().to(get_pricing)),
    );
}
