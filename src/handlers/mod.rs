pub mod account;
pub mod auth;
pub mod gacha;
pub mod raffle;

use actix_web::web;

pub use auth::auth_config;
pub use gacha::gacha_config;
pub use raffle::raffle_config;

/// 当前用户相关路由（/me）
pub fn me_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/me")
            .route("/referrals", web::get().to(account::referrals))
            .route("/rewards", web::get().to(account::rewards))
            .route("/rewards/{reward_id}/redeem", web::post().to(account::redeem_reward))
            .route("/analytics", web::get().to(account::analytics))
            .route("/gachas", web::get().to(gacha::my_gachas))
            .route("/raffles", web::get().to(raffle::my_raffles))
            .route("/purchases", web::get().to(raffle::my_purchases)),
    );
}
