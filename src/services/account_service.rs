use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::RaffleService;
use crate::store::{SharedStore, append_as, keys, list_as};

/// 推荐注册奖励积分
pub const REFERRAL_SIGNUP_POINTS: i64 = 100;
/// 被推荐人每次抽扭蛋带来的积分
pub const POINTS_PER_GACHA_PLAY: i64 = 10;
/// 被推荐人每购买一个号码带来的积分
pub const POINTS_PER_RAFFLE_NUMBER: i64 = 10;

/// 积分兑换目录
pub fn reward_catalog() -> Vec<RewardItem> {
    let item = |id: &str,
                kind: RewardKind,
                title: &str,
                description: &str,
                cost: i64,
                quantity: u32| RewardItem {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        description: description.to_string(),
        cost,
        quantity,
    };
    vec![
        item(
            "gacha-3",
            RewardKind::Gacha,
            "3 gacha tickets",
            "Three free plays on any gacha machine",
            100,
            3,
        ),
        item(
            "raffle-2",
            RewardKind::Raffle,
            "2 raffle numbers",
            "Two free numbers on any open raffle",
            150,
            2,
        ),
        item(
            "gacha-5",
            RewardKind::Gacha,
            "5 gacha tickets",
            "Five free plays on any gacha machine",
            200,
            5,
        ),
        item(
            "raffle-5",
            RewardKind::Raffle,
            "5 raffle numbers",
            "Five free numbers on any open raffle",
            300,
            5,
        ),
    ]
}

#[derive(Debug, Default, Clone, Copy)]
struct PlayerActivity {
    gacha_plays: u64,
    raffle_numbers: u64,
}

impl PlayerActivity {
    fn points(self) -> i64 {
        REFERRAL_SIGNUP_POINTS
            + self.gacha_plays as i64 * POINTS_PER_GACHA_PLAY
            + self.raffle_numbers as i64 * POINTS_PER_RAFFLE_NUMBER
    }

    fn is_active(self) -> bool {
        self.gacha_plays > 0 || self.raffle_numbers > 0
    }
}

/// 推荐、积分奖励与个人统计
#[derive(Clone)]
pub struct AccountService {
    store: SharedStore,
    raffles: RaffleService,
    // 余额检查与兑换记录在同一把锁内完成
    redeem_lock: Arc<Mutex<()>>,
}

impl AccountService {
    pub fn new(store: SharedStore, raffles: RaffleService) -> Self {
        Self {
            store,
            raffles,
            redeem_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 获取推荐列表与积分
    pub async fn referrals(&self, user_id: Uuid) -> AppResult<ReferralsResponse> {
        let users: Vec<User> = list_as(self.store.as_ref(), keys::USERS).await?;
        let me = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let mut referrals = Vec::new();
        for user in users.iter().filter(|u| u.referrer_id == Some(user_id)) {
            let activity = self.activity_of(user.id).await?;
            referrals.push(ReferralEntry {
                username: user.username.clone(),
                joined_at: user.created_at,
                points_generated: activity.points(),
                is_active: activity.is_active(),
            });
        }

        Ok(ReferralsResponse {
            referral_code: me.referral_code.clone(),
            total_referrals: referrals.len(),
            total_points: referrals.iter().map(|r| r.points_generated).sum(),
            referrals,
        })
    }

    pub async fn rewards(&self, user_id: Uuid) -> AppResult<RewardsResponse> {
        let points_earned = self.referrals(user_id).await?.total_points;
        let mut redemptions: Vec<RewardRedemption> =
            list_as(self.store.as_ref(), &keys::reward_redemptions(user_id)).await?;
        let points_spent = redemptions.iter().map(|r| r.cost).sum();
        redemptions.reverse();

        Ok(RewardsResponse {
            points_earned,
            points_spent,
            balance: points_earned - points_spent,
            rewards: reward_catalog(),
            redemptions,
        })
    }

    /// 兑换奖励：积分不足时拒绝
    pub async fn redeem_reward(
        &self,
        user_id: Uuid,
        reward_id: &str,
    ) -> AppResult<RedeemRewardResponse> {
        let reward = reward_catalog()
            .into_iter()
            .find(|r| r.id == reward_id)
            .ok_or_else(|| AppError::NotFound(format!("Reward {reward_id}")))?;

        let _guard = self.redeem_lock.lock().await;
        let balance = self.rewards(user_id).await?.balance;
        if balance < reward.cost {
            return Err(AppError::ValidationError(format!(
                "Not enough points: {} needed, {} available",
                reward.cost, balance
            )));
        }

        let redemption = RewardRedemption {
            id: Uuid::new_v4(),
            user_id,
            reward_id: reward.id,
            kind: reward.kind,
            quantity: reward.quantity,
            cost: reward.cost,
            created_at: Utc::now(),
        };
        append_as(
            self.store.as_ref(),
            &keys::reward_redemptions(user_id),
            &redemption,
        )
        .await?;
        log::info!(
            "User {} redeemed {} for {} points",
            user_id,
            redemption.reward_id,
            redemption.cost
        );

        Ok(RedeemRewardResponse {
            balance: balance - redemption.cost,
            redemption,
        })
    }

    pub async fn analytics(&self, user_id: Uuid) -> AppResult<AnalyticsResponse> {
        let mut spent: BTreeMap<String, i64> = BTreeMap::new();
        let mut earned: BTreeMap<String, i64> = BTreeMap::new();

        // 抽签
        let raffles: Vec<Raffle> = list_as(self.store.as_ref(), keys::RAFFLES).await?;
        let purchases = self.raffles.purchases_by(user_id).await?;
        for purchase in &purchases {
            *spent.entry(purchase.currency.clone()).or_default() += purchase.amount;
        }
        let entered: HashSet<Uuid> = purchases.iter().map(|p| p.raffle_id).collect();

        let mut raffle_stats = ActivityStats {
            participations: entered.len() as u64,
            purchases: purchases.len() as u64,
            ..Default::default()
        };
        let mut sell_through = Vec::new();
        let mut raffles_won = 0u64;
        let mut drawn_entered = 0u64;
        for raffle in &raffles {
            if entered.contains(&raffle.id)
                && let Some(winner) = &raffle.winner
            {
                drawn_entered += 1;
                if winner.buyer_id == Some(user_id) {
                    raffles_won += 1;
                }
            }
            if raffle.creator_id != user_id {
                continue;
            }
            let sold: Vec<Purchase> =
                list_as(self.store.as_ref(), &keys::raffle_purchases(raffle.id)).await?;
            let numbers: u64 = sold.iter().map(|p| p.numbers.len() as u64).sum();
            raffle_stats.created += 1;
            raffle_stats.sales += numbers;
            *earned.entry(raffle.currency.clone()).or_default() +=
                numbers as i64 * raffle.price_per_number;
            sell_through.push(numbers as f64 * 100.0 / f64::from(raffle.max_numbers));
        }

        // 扭蛋
        let gachas: Vec<Gacha> = list_as(self.store.as_ref(), keys::GACHAS).await?;
        let mut gacha_stats = ActivityStats::default();
        for gacha in &gachas {
            let plays = self.plays_on(gacha.id, user_id).await?;
            if plays > 0 {
                gacha_stats.participations += 1;
                gacha_stats.purchases += plays;
                *spent.entry(gacha.currency.clone()).or_default() +=
                    plays as i64 * gacha.price_per_play;
            }
            if gacha.creator_id == user_id {
                let sales = self
                    .store
                    .list(&keys::gacha_results(gacha.id))
                    .await?
                    .len() as u64;
                gacha_stats.created += 1;
                gacha_stats.sales += sales;
                *earned.entry(gacha.currency.clone()).or_default() +=
                    sales as i64 * gacha.price_per_play;
            }
        }

        Ok(AnalyticsResponse {
            raffles: raffle_stats,
            gachas: gacha_stats,
            total: raffle_stats.combined(gacha_stats),
            spent,
            earned,
            raffles_won,
            success_rate: percent(raffles_won, drawn_entered),
            average_sell_through: if sell_through.is_empty() {
                0.0
            } else {
                sell_through.iter().sum::<f64>() / sell_through.len() as f64
            },
        })
    }

    async fn plays_on(&self, gacha_id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let history = self
            .store
            .list(&keys::user_gacha_results(gacha_id, user_id))
            .await?;
        Ok(history.len() as u64)
    }

    async fn activity_of(&self, user_id: Uuid) -> AppResult<PlayerActivity> {
        let gachas: Vec<Gacha> = list_as(self.store.as_ref(), keys::GACHAS).await?;
        let mut activity = PlayerActivity::default();
        for gacha in &gachas {
            activity.gacha_plays += self.plays_on(gacha.id, user_id).await?;
        }
        activity.raffle_numbers = self
            .raffles
            .purchases_by(user_id)
            .await?
            .iter()
            .map(|p| p.numbers.len() as u64)
            .sum();
        Ok(activity)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GachaConfig;
    use crate::services::{AuthService, GachaService};
    use crate::store::MemoryStore;
    use crate::utils::{JwtService, ScriptedSource, shared};

    struct Fixture {
        auth: AuthService,
        gachas: GachaService,
        raffles: RaffleService,
        accounts: AccountService,
    }

    fn fixture() -> Fixture {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let rng = shared(ScriptedSource::new(vec![0]));
        let raffles = RaffleService::new(store.clone(), rng.clone());
        Fixture {
            auth: AuthService::new(store.clone(), JwtService::new("test-secret", 60, 600)),
            gachas: GachaService::new(store.clone(), rng, GachaConfig::default()),
            accounts: AccountService::new(store, raffles.clone()),
            raffles,
        }
    }

    async fn register(f: &Fixture, email: &str, referrer_code: Option<String>) -> UserResponse {
        f.auth
            .register(CreateUserRequest {
                email: email.to_string(),
                username: email.split('@').next().unwrap_or("user").to_string(),
                password: "Password123".to_string(),
                referrer_code,
            })
            .await
            .unwrap()
            .user
    }

    fn gacha_request(price: i64, max_attempts: u32) -> CreateGachaRequest {
        CreateGachaRequest {
            title: "Capsules".into(),
            description: String::new(),
            price_per_play: price,
            currency: "CLP".into(),
            max_attempts_per_person: max_attempts,
            prizes: vec![NewPrize {
                name: "Plush".into(),
                description: String::new(),
                tier: RarityTier::Common,
                visual_tag: "#ff6b9d".into(),
                image_ref: None,
                emotion_level: 3,
            }],
            tier_weights: TierWeights {
                common: 100,
                rare: 0,
                epic: 0,
                legendary: 0,
            },
            show_animation: true,
            show_prize_list: true,
            show_public_results: true,
        }
    }

    fn raffle_request(max_numbers: u32, price: i64) -> CreateRaffleRequest {
        CreateRaffleRequest {
            title: "Raffle".into(),
            description: String::new(),
            max_numbers,
            price_per_number: price,
            currency: "USD".into(),
            draw_date: None,
            is_anonymous: false,
        }
    }

    #[tokio::test]
    async fn test_referral_points_follow_activity() {
        let f = fixture();
        let host = register(&f, "host@example.com", None).await;
        let active = register(&f, "active@example.com", Some(host.referral_code.clone())).await;
        register(&f, "idle@example.com", Some(host.referral_code.clone())).await;

        let gacha = f
            .gachas
            .create_gacha(host.id, gacha_request(500, 5))
            .await
            .unwrap();
        f.gachas.play(active.id, gacha.id).await.unwrap();
        f.gachas.play(active.id, gacha.id).await.unwrap();
        let raffle = f
            .raffles
            .create_raffle(host.id, raffle_request(10, 100))
            .await
            .unwrap();
        f.raffles
            .purchase_numbers(
                active.id,
                raffle.id,
                PurchaseNumbersRequest {
                    numbers: vec![1, 2, 3],
                },
            )
            .await
            .unwrap();

        let referrals = f.accounts.referrals(host.id).await.unwrap();
        assert_eq!(referrals.total_referrals, 2);
        let active_entry = referrals
            .referrals
            .iter()
            .find(|r| r.username == "active")
            .unwrap();
        assert_eq!(active_entry.points_generated, 100 + 2 * 10 + 3 * 10);
        assert!(active_entry.is_active);
        let idle_entry = referrals
            .referrals
            .iter()
            .find(|r| r.username == "idle")
            .unwrap();
        assert_eq!(idle_entry.points_generated, REFERRAL_SIGNUP_POINTS);
        assert!(!idle_entry.is_active);
        assert_eq!(referrals.total_points, 250);
    }

    #[tokio::test]
    async fn test_redeem_spends_points_and_rejects_overdraft() {
        let f = fixture();
        let host = register(&f, "host@example.com", None).await;
        register(&f, "ana@example.com", Some(host.referral_code.clone())).await;
        register(&f, "bea@example.com", Some(host.referral_code.clone())).await;

        let first = f.accounts.redeem_reward(host.id, "raffle-2").await.unwrap();
        assert_eq!(first.balance, 50);
        assert_eq!(first.redemption.quantity, 2);

        assert!(matches!(
            f.accounts.redeem_reward(host.id, "gacha-3").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            f.accounts.redeem_reward(host.id, "nope").await,
            Err(AppError::NotFound(_))
        ));

        let rewards = f.accounts.rewards(host.id).await.unwrap();
        assert_eq!(
            (rewards.points_earned, rewards.points_spent, rewards.balance),
            (200, 150, 50)
        );
        assert_eq!(rewards.redemptions.len(), 1);
        assert_eq!(rewards.rewards.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_cannot_overdraw() {
        let f = fixture();
        let host = register(&f, "host@example.com", None).await;
        register(&f, "ana@example.com", Some(host.referral_code.clone())).await;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let accounts = f.accounts.clone();
            let user_id = host.id;
            handles.push(tokio::spawn(async move {
                accounts.redeem_reward(user_id, "gacha-3").await
            }));
        }
        let mut redeemed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                redeemed += 1;
            }
        }
        assert_eq!(redeemed, 1);
        assert_eq!(f.accounts.rewards(host.id).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_analytics_as_player_and_creator() {
        let f = fixture();
        let creator = register(&f, "creator@example.com", None).await;
        let player = register(&f, "player@example.com", None).await;

        let gacha = f
            .gachas
            .create_gacha(creator.id, gacha_request(500, 5))
            .await
            .unwrap();
        for _ in 0..3 {
            f.gachas.play(player.id, gacha.id).await.unwrap();
        }
        let raffle = f
            .raffles
            .create_raffle(creator.id, raffle_request(10, 100))
            .await
            .unwrap();
        f.raffles
            .purchase_numbers(
                player.id,
                raffle.id,
                PurchaseNumbersRequest {
                    numbers: vec![4, 5],
                },
            )
            .await
            .unwrap();
        // 脚本随机源返回 0：第一个已售号码 (4) 中奖
        f.raffles.draw_winner(creator.id, raffle.id).await.unwrap();

        let played = f.accounts.analytics(player.id).await.unwrap();
        assert_eq!(played.gachas.purchases, 3);
        assert_eq!(played.gachas.participations, 1);
        assert_eq!(played.raffles.participations, 1);
        assert_eq!(played.total.purchases, 4);
        assert_eq!(played.spent.get("CLP"), Some(&1500));
        assert_eq!(played.spent.get("USD"), Some(&200));
        assert!(played.earned.is_empty());
        assert_eq!(played.raffles_won, 1);
        assert!((played.success_rate - 100.0).abs() < 1e-9);

        let created = f.accounts.analytics(creator.id).await.unwrap();
        assert_eq!(created.total.created, 2);
        assert_eq!(created.gachas.sales, 3);
        assert_eq!(created.raffles.sales, 2);
        assert_eq!(created.earned.get("CLP"), Some(&1500));
        assert_eq!(created.earned.get("USD"), Some(&200));
        assert!((created.average_sell_through - 20.0).abs() < 1e-9);
        assert_eq!(created.total.purchases, 0);
    }
}
