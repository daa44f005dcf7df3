use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;
use crate::utils::{PaginationInfo, PaginationParams};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::account::referrals,
        handlers::account::rewards,
        handlers::account::redeem_reward,
        handlers::account::analytics,
        handlers::gacha::list_gachas,
        handlers::gacha::create_gacha,
        handlers::gacha::preview_pricing,
        handlers::gacha::get_gacha,
        handlers::gacha::add_prize,
        handlers::gacha::remove_prize,
        handlers::gacha::update_weights,
        handlers::gacha::set_featured,
        handlers::gacha::play,
        handlers::gacha::get_attempts,
        handlers::gacha::get_history,
        handlers::gacha::get_public_results,
        handlers::gacha::get_pricing,
        handlers::gacha::my_gachas,
        handlers::raffle::list_raffles,
        handlers::raffle::create_raffle,
        handlers::raffle::get_raffle,
        handlers::raffle::purchase_numbers,
        handlers::raffle::draw_winner,
        handlers::raffle::my_purchases,
        handlers::raffle::my_raffles,
    ),
    components(
        schemas(
            UserResponse,
            CreateUserRequest,
            LoginRequest,
            RefreshTokenRequest,
            AuthResponse,
            ReferralEntry,
            ReferralsResponse,
            RewardKind,
            RewardItem,
            RewardRedemption,
            RewardsResponse,
            RedeemRewardResponse,
            ActivityStats,
            AnalyticsResponse,
            RarityTier,
            TierWeights,
            PrizeEntry,
            Catalog,
            NewPrize,
            CreateGachaRequest,
            UpdateTierWeightsRequest,
            SetFeaturedRequest,
            PrizeView,
            GachaResponse,
            DrawResult,
            PlayResponse,
            AttemptStatusResponse,
            TierCount,
            PublicResultsResponse,
            PricingSuggestion,
            PricingResponse,
            RaffleWinner,
            Purchase,
            CreateRaffleRequest,
            PurchaseNumbersRequest,
            RaffleResponse,
            PaginationParams,
            PaginationInfo,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "account", description = "Referrals, reward points and statistics API"),
        (name = "gacha", description = "Gacha machine API"),
        (name = "raffle", description = "Numbered raffle API"),
    ),
    info(
        title = "Raffle Backend API",
        version = "1.0.0",
        description = "Raffle and gacha REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
