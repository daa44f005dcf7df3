use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// 推荐的用户（仅公开信息）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferralEntry {
    pub username: String,
    pub joined_at: DateTime<Utc>,
    /// 该用户为推荐人带来的积分
    pub points_generated: i64,
    /// 至少抽过一次扭蛋或买过一个号码
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferralsResponse {
    pub referral_code: String,
    pub total_referrals: usize,
    pub total_points: i64,
    pub referrals: Vec<ReferralEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Gacha,
    Raffle,
}

/// 可兑换的奖励
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RewardItem {
    pub id: String,
    pub kind: RewardKind,
    pub title: String,
    pub description: String,
    /// 兑换所需积分
    pub cost: i64,
    /// 赠送的抽取次数或号码数量
    pub quantity: u32,
}

/// 积分兑换记录
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RewardRedemption {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reward_id: String,
    pub kind: RewardKind,
    pub quantity: u32,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RewardsResponse {
    pub points_earned: i64,
    pub points_spent: i64,
    pub balance: i64,
    pub rewards: Vec<RewardItem>,
    pub redemptions: Vec<RewardRedemption>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemRewardResponse {
    pub redemption: RewardRedemption,
    pub balance: i64,
}

/// 某类玩法的统计（作为玩家与创建者）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActivityStats {
    /// 参与过的抽签或扭蛋机数量
    pub participations: u64,
    /// 购买次数（抽签订单或扭蛋抽取）
    pub purchases: u64,
    pub created: u64,
    /// 自建玩法售出的号码或被抽取次数
    pub sales: u64,
}

impl ActivityStats {
    pub fn combined(self, other: ActivityStats) -> ActivityStats {
        ActivityStats {
            participations: self.participations + other.participations,
            purchases: self.purchases + other.purchases,
            created: self.created + other.created,
            sales: self.sales + other.sales,
        }
    }
}

/// 用户统计面板
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub raffles: ActivityStats,
    pub gachas: ActivityStats,
    pub total: ActivityStats,
    /// 按币种统计的消费金额
    pub spent: BTreeMap<String, i64>,
    /// 按币种统计的自建玩法收入
    pub earned: BTreeMap<String, i64>,
    pub raffles_won: u64,
    /// 中奖次数占已开奖参与抽签的百分比
    pub success_rate: f64,
    /// 自建抽签的平均售出比例 (%)
    pub average_sell_through: f64,
}
