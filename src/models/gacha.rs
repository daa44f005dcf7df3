use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::PaginatedResponse;

/// 奖品稀有度，声明顺序即从低到高的展示顺序；抽取按 [`RarityTier::ALL`] 顺序遍历
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RarityTier {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl RarityTier {
    pub const ALL: [RarityTier; 4] = [
        RarityTier::Common,
        RarityTier::Rare,
        RarityTier::Epic,
        RarityTier::Legendary,
    ];

    /// 抽中该稀有度时是否播放庆祝效果
    pub fn is_celebrated(self) -> bool {
        matches!(self, RarityTier::Epic | RarityTier::Legendary)
    }
}

impl std::fmt::Display for RarityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RarityTier::Common => write!(f, "common"),
            RarityTier::Rare => write!(f, "rare"),
            RarityTier::Epic => write!(f, "epic"),
            RarityTier::Legendary => write!(f, "legendary"),
        }
    }
}

/// 各稀有度的百分比权重：每项在 `[0, 100]` 内且四项之和恰为 100 时才可抽取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TierWeights {
    pub common: i32,
    pub rare: i32,
    pub epic: i32,
    pub legendary: i32,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            common: 60,
            rare: 25,
            epic: 12,
            legendary: 3,
        }
    }
}

impl TierWeights {
    pub const TOTAL: i32 = 100;

    pub fn get(&self, tier: RarityTier) -> i32 {
        match tier {
            RarityTier::Common => self.common,
            RarityTier::Rare => self.rare,
            RarityTier::Epic => self.epic,
            RarityTier::Legendary => self.legendary,
        }
    }

    pub fn set(&mut self, tier: RarityTier, weight: i32) {
        match tier {
            RarityTier::Common => self.common = weight,
            RarityTier::Rare => self.rare = weight,
            RarityTier::Epic => self.epic = weight,
            RarityTier::Legendary => self.legendary = weight,
        }
    }

    pub fn total(&self) -> i64 {
        RarityTier::ALL
            .iter()
            .map(|&tier| i64::from(self.get(tier)))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrizeEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tier: RarityTier,
    /// 扭蛋外壳颜色标记
    pub visual_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// 揭晓动画的兴奋程度 (1-5)
    #[serde(default = "default_emotion_level")]
    pub emotion_level: u8,
}

fn default_emotion_level() -> u8 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Catalog {
    pub prizes: Vec<PrizeEntry>,
    pub tier_weights: TierWeights,
}

impl Catalog {
    pub fn new(prizes: Vec<PrizeEntry>, tier_weights: TierWeights) -> Self {
        Self {
            prizes,
            tier_weights,
        }
    }

    /// 某一稀有度的奖品（保持目录顺序）
    pub fn members(&self, tier: RarityTier) -> Vec<&PrizeEntry> {
        self.prizes.iter().filter(|p| p.tier == tier).collect()
    }

    pub fn population(&self, tier: RarityTier) -> usize {
        self.prizes.iter().filter(|p| p.tier == tier).count()
    }

    pub fn find(&self, prize_id: &str) -> Option<&PrizeEntry> {
        self.prizes.iter().find(|p| p.id == prize_id)
    }

    /// 列表中展示的概率，即稀有度权重
    pub fn tier_probability(&self, tier: RarityTier) -> i32 {
        self.tier_weights.get(tier)
    }

    /// 抽中该奖品的实际概率 (%)
    pub fn effective_probability(&self, prize: &PrizeEntry) -> f64 {
        let population = self.population(prize.tier);
        if population == 0 {
            return 0.0;
        }
        f64::from(self.tier_weights.get(prize.tier)) / population as f64
    }
}

/// 已发布的扭蛋机
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gacha {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub price_per_play: i64,
    pub currency: String,
    pub max_attempts_per_person: u32,
    pub catalog: Catalog,
    pub show_animation: bool,
    pub show_prize_list: bool,
    pub show_public_results: bool,
    #[serde(default)]
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

/// 单次抽取结果，创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawResult {
    pub id: Uuid,
    pub gacha_id: Uuid,
    pub user_id: Uuid,
    pub prize: PrizeEntry,
    /// 该用户在此扭蛋机上的第几次抽取（从 1 开始）
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPrize {
    #[schema(example = "Golden Dragon")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: RarityTier,
    #[schema(example = "#ff6b9d")]
    #[serde(default = "default_visual_tag")]
    pub visual_tag: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default = "default_emotion_level")]
    pub emotion_level: u8,
}

fn default_visual_tag() -> String {
    "#ff6b9d".to_string()
}

/// 创建扭蛋机请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateGachaRequest {
    #[schema(example = "Summer capsules")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[schema(example = 1000)]
    pub price_per_play: i64,
    #[schema(example = "CLP")]
    #[serde(default = "default_currency")]
    pub currency: String,
    #[schema(example = 10)]
    pub max_attempts_per_person: u32,
    pub prizes: Vec<NewPrize>,
    #[serde(default)]
    pub tier_weights: TierWeights,
    #[serde(default = "default_true")]
    pub show_animation: bool,
    #[serde(default = "default_true")]
    pub show_prize_list: bool,
    #[serde(default)]
    pub show_public_results: bool,
}

pub(crate) fn default_currency() -> String {
    "CLP".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateTierWeightsRequest {
    pub tier_weights: TierWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetFeaturedRequest {
    pub featured: bool,
}

/// 展示给玩家的奖品及两种概率
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrizeView {
    #[serde(flatten)]
    pub prize: PrizeEntry,
    /// 稀有度权重 (%)
    pub probability: i32,
    /// 稀有度权重除以该稀有度的奖品数量
    pub effective_probability: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GachaResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub price_per_play: i64,
    pub currency: String,
    pub max_attempts_per_person: u32,
    pub tier_weights: TierWeights,
    pub prize_count: usize,
    /// 创建者隐藏奖品列表时为空
    pub prizes: Vec<PrizeView>,
    pub show_animation: bool,
    pub show_prize_list: bool,
    pub show_public_results: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl GachaResponse {
    /// 构建列表视图，创建者始终能看到自己的奖品
    pub fn from_gacha(gacha: &Gacha, viewer: Option<Uuid>) -> Self {
        let reveal = gacha.show_prize_list || viewer == Some(gacha.creator_id);
        let catalog = &gacha.catalog;
        let prizes = if reveal {
            catalog
                .prizes
                .iter()
                .map(|p| PrizeView {
                    prize: p.clone(),
                    probability: catalog.tier_probability(p.tier),
                    effective_probability: catalog.effective_probability(p),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            id: gacha.id,
            creator_id: gacha.creator_id,
            title: gacha.title.clone(),
            description: gacha.description.clone(),
            price_per_play: gacha.price_per_play,
            currency: gacha.currency.clone(),
            max_attempts_per_person: gacha.max_attempts_per_person,
            tier_weights: catalog.tier_weights,
            prize_count: catalog.prizes.len(),
            prizes,
            show_animation: gacha.show_animation,
            show_prize_list: gacha.show_prize_list,
            show_public_results: gacha.show_public_results,
            featured: gacha.featured,
            created_at: gacha.created_at,
        }
    }
}

/// 抽奖（Play）响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayResponse {
    pub result: DrawResult,
    /// 史诗与传说奖品为 true
    pub celebrate: bool,
    pub show_animation: bool,
    pub attempts_used: u32,
    pub remaining_attempts: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptStatusResponse {
    pub used: u32,
    pub max: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TierCount {
    pub tier: RarityTier,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicResultsResponse {
    pub total_draws: u64,
    pub by_tier: Vec<TierCount>,
    /// 最近的抽取（倒序）
    pub recent: Vec<DrawResult>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PricingSuggestion {
    pub min: i64,
    pub recommended: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PricingResponse {
    pub common: PricingSuggestion,
    pub rare: PricingSuggestion,
    pub epic: PricingSuggestion,
    pub legendary: PricingSuggestion,
    pub expected_value: f64,
    pub recommended_price: i64,
}

pub type DrawHistoryPageResponse = PaginatedResponse<DrawResult>;

#[cfg(test)]
mod tests {
    use super::*;

    fn prize(id: &str, tier: RarityTier) -> PrizeEntry {
        PrizeEntry {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            tier,
            visual_tag: "#000000".to_string(),
            image_ref: None,
            emotion_level: 3,
        }
    }

    #[test]
    fn test_tier_order_and_wire_names() {
        assert!(RarityTier::Legendary > RarityTier::Epic);
        assert!(RarityTier::Rare > RarityTier::Common);
        assert_eq!(
            serde_json::to_string(&RarityTier::Legendary).unwrap(),
            "\"legendary\""
        );
        assert!(RarityTier::Epic.is_celebrated());
        assert!(!RarityTier::Rare.is_celebrated());
    }

    #[test]
    fn test_weights_get_set_total() {
        let mut weights = TierWeights::default();
        assert_eq!(weights.total(), 100);
        weights.set(RarityTier::Epic, 20);
        assert_eq!(weights.get(RarityTier::Epic), 20);
        assert_eq!(weights.total(), 108);
    }

    #[test]
    fn test_probability_figures() {
        let catalog = Catalog::new(
            vec![
                prize("a", RarityTier::Common),
                prize("b", RarityTier::Rare),
                prize("c", RarityTier::Rare),
                prize("d", RarityTier::Rare),
                prize("e", RarityTier::Rare),
                prize("f", RarityTier::Rare),
            ],
            TierWeights {
                common: 75,
                rare: 25,
                epic: 0,
                legendary: 0,
            },
        );
        let rare = catalog.find("c").unwrap();
        assert_eq!(catalog.tier_probability(rare.tier), 25);
        assert!((catalog.effective_probability(rare) - 5.0).abs() < f64::EPSILON);
        assert_eq!(catalog.members(RarityTier::Rare).len(), 5);
    }

    #[test]
    fn test_hidden_prize_list_visible_to_creator() {
        let creator = Uuid::new_v4();
        let gacha = Gacha {
            id: Uuid::new_v4(),
            creator_id: creator,
            title: "t".into(),
            description: String::new(),
            price_per_play: 100,
            currency: "CLP".into(),
            max_attempts_per_person: 3,
            catalog: Catalog::new(
                vec![prize("a", RarityTier::Common)],
                TierWeights {
                    common: 100,
                    rare: 0,
                    epic: 0,
                    legendary: 0,
                },
            ),
            show_animation: true,
            show_prize_list: false,
            show_public_results: false,
            featured: false,
            created_at: Utc::now(),
        };

        assert!(GachaResponse::from_gacha(&gacha, None).prizes.is_empty());
        assert!(
            GachaResponse::from_gacha(&gacha, Some(Uuid::new_v4()))
                .prizes
                .is_empty()
        );
        let own = GachaResponse::from_gacha(&gacha, Some(creator));
        assert_eq!(own.prizes.len(), 1);
        assert_eq!(own.prize_count, 1);
    }
}
