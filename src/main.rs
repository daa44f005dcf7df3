use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use raffle_backend::{
    config::Config,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    store::create_store,
    swagger::swagger_config,
    utils::{JwtService, source_from_seed},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 打开存储
    let store = create_store(&config.store)
        .await
        .expect("Failed to open key-value store");
    log::info!("Using {:?} store", config.store.backend);

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 扭蛋与抽签共用一个随机源
    if config.draw.seed.is_some() {
        log::warn!("Draw generator is seeded; results are reproducible");
    }
    let rng = source_from_seed(config.draw.seed);

    // 创建服务
    let auth_service = AuthService::new(store.clone(), jwt_service.clone());
    let gacha_service = GachaService::new(store.clone(), rng.clone(), config.gacha.clone());
    let raffle_service = RaffleService::new(store.clone(), rng);
    let account_service = AccountService::new(store, raffle_service.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origins = config.server.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&allowed_origins))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(gacha_service.clone()))
            .app_data(web::Data::new(raffle_service.clone()))
            .app_data(web::Data::new(account_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::gacha_config)
                    .configure(handlers::raffle_config)
                    .configure(handlers::me_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
