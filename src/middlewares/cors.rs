use actix_cors::Cors;

pub fn create_cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if allowed_origins.is_empty() {
        // 未配置时放行所有来源（本地开发）
        return cors.allowed_origin_fn(|_, _req_head| true);
    }

    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
