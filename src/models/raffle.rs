use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::gacha::default_currency;

/// 编号抽签，号码为 1 到 `max_numbers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raffle {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub max_numbers: u32,
    pub price_per_number: i64,
    pub currency: String,
    pub draw_date: Option<DateTime<Utc>>,
    pub is_anonymous: bool,
    #[serde(default)]
    pub winner: Option<RaffleWinner>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RaffleWinner {
    pub number: u32,
    /// 匿名抽签对其他用户隐藏
    pub buyer_id: Option<Uuid>,
    pub drawn_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Purchase {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub buyer_id: Uuid,
    pub numbers: Vec<u32>,
    pub amount: i64,
    pub currency: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

/// 创建抽签请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRaffleRequest {
    #[schema(example = "Autumn raffle")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[schema(example = 100)]
    pub max_numbers: u32,
    #[schema(example = 1000)]
    pub price_per_number: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub draw_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseNumbersRequest {
    #[schema(example = json!([7, 13, 42]))]
    pub numbers: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RaffleResponse {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: String,
    pub max_numbers: u32,
    pub price_per_number: i64,
    pub currency: String,
    pub draw_date: Option<DateTime<Utc>>,
    pub is_anonymous: bool,
    pub sold_numbers: Vec<u32>,
    pub sold_count: u32,
    pub available: u32,
    /// 已售号码数乘以单价
    pub revenue: i64,
    pub winner: Option<RaffleWinner>,
    pub created_at: DateTime<Utc>,
}

impl RaffleResponse {
    pub fn new(raffle: &Raffle, mut sold_numbers: Vec<u32>, viewer: Option<Uuid>) -> Self {
        sold_numbers.sort_unstable();
        let sold_count = sold_numbers.len() as u32;
        let available = raffle.max_numbers.saturating_sub(sold_count);
        let revenue = i64::from(sold_count) * raffle.price_per_number;
        let winner = raffle.winner.clone().map(|mut w| {
            if raffle.is_anonymous && viewer != w.buyer_id && viewer != Some(raffle.creator_id) {
                w.buyer_id = None;
            }
            w
        });

        Self {
            id: raffle.id,
            creator_id: raffle.creator_id,
            title: raffle.title.clone(),
            description: raffle.description.clone(),
            max_numbers: raffle.max_numbers,
            price_per_number: raffle.price_per_number,
            currency: raffle.currency.clone(),
            draw_date: raffle.draw_date,
            is_anonymous: raffle.is_anonymous,
            sold_numbers,
            sold_count,
            available,
            revenue,
            winner,
            created_at: raffle.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raffle(is_anonymous: bool, buyer: Uuid) -> Raffle {
        Raffle {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            title: "r".into(),
            description: String::new(),
            max_numbers: 10,
            price_per_number: 100,
            currency: "CLP".into(),
            draw_date: None,
            is_anonymous,
            winner: Some(RaffleWinner {
                number: 3,
                buyer_id: Some(buyer),
                drawn_at: Utc::now(),
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sold_numbers_sorted_and_counted() {
        let r = raffle(false, Uuid::new_v4());
        let view = RaffleResponse::new(&r, vec![9, 3, 5], None);
        assert_eq!(view.sold_numbers, vec![3, 5, 9]);
        assert_eq!(view.available, 7);
    }

    #[test]
    fn test_anonymous_winner_hidden_from_strangers() {
        let buyer = Uuid::new_v4();
        let r = raffle(true, buyer);
        let stranger = RaffleResponse::new(&r, vec![3], Some(Uuid::new_v4()));
        assert!(stranger.winner.unwrap().buyer_id.is_none());
        let own = RaffleResponse::new(&r, vec![3], Some(buyer));
        assert_eq!(own.winner.unwrap().buyer_id, Some(buyer));
    }
}
