use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    CreateRaffleRequest, Purchase, PurchaseNumbersRequest, Raffle, RaffleResponse, RaffleWinner,
};
use crate::store::{SharedStore, append_as, keys, list_as, replace_as};
use crate::utils::{
    PaginatedResponse, PaginationParams, SharedRandom, require_text, validate_currency,
};

pub const MAX_RAFFLE_NUMBERS: u32 = 10_000;

#[derive(Clone)]
pub struct RaffleService {
    store: SharedStore,
    rng: SharedRandom,
    // 售号与开奖都是对存储的读-检查-写
    write_lock: Arc<Mutex<()>>,
}

impl RaffleService {
    pub fn new(store: SharedStore, rng: SharedRandom) -> Self {
        Self {
            store,
            rng,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create_raffle(
        &self,
        creator_id: Uuid,
        request: CreateRaffleRequest,
    ) -> AppResult<RaffleResponse> {
        require_text("title", &request.title, 120)?;
        validate_currency(&request.currency)?;
        if !(1..=MAX_RAFFLE_NUMBERS).contains(&request.max_numbers) {
            return Err(AppError::ValidationError(format!(
                "Max numbers must be between 1 and {MAX_RAFFLE_NUMBERS}"
            )));
        }
        if request.price_per_number < 0 {
            return Err(AppError::ValidationError(
                "Price per number cannot be negative".into(),
            ));
        }

        let raffle = Raffle {
            id: Uuid::new_v4(),
            creator_id,
            title: request.title.trim().to_string(),
            description: request.description,
            max_numbers: request.max_numbers,
            price_per_number: request.price_per_number,
            currency: request.currency,
            draw_date: request.draw_date,
            is_anonymous: request.is_anonymous,
            winner: None,
            created_at: Utc::now(),
        };

        {
            let _guard = self.write_lock.lock().await;
            append_as(self.store.as_ref(), keys::RAFFLES, &raffle).await?;
        }
        log::info!("Raffle {} created by {}", raffle.id, creator_id);

        Ok(RaffleResponse::new(&raffle, Vec::new(), Some(creator_id)))
    }

    pub async fn list_raffles(
        &self,
        params: &PaginationParams,
        viewer: Option<Uuid>,
    ) -> AppResult<PaginatedResponse<RaffleResponse>> {
        let mut raffles: Vec<Raffle> = list_as(self.store.as_ref(), keys::RAFFLES).await?;
        raffles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = raffles.len() as i64;
        let mut items = Vec::new();
        for raffle in raffles
            .iter()
            .skip(params.get_offset() as usize)
            .take(params.get_limit() as usize)
        {
            let sold = self.sold_numbers(raffle.id).await?;
            items.push(RaffleResponse::new(raffle, sold, viewer));
        }
        Ok(PaginatedResponse::new(items, params, total))
    }

    pub async fn get_raffle(&self, raffle_id: Uuid, viewer: Option<Uuid>) -> AppResult<RaffleResponse> {
        let raffle = self.load_raffle(raffle_id).await?;
        let sold = self.sold_numbers(raffle_id).await?;
        Ok(RaffleResponse::new(&raffle, sold, viewer))
    }

    /// 购买号码：号码须在范围内、不重复且未售出
    pub async fn purchase_numbers(
        &self,
        buyer_id: Uuid,
        raffle_id: Uuid,
        request: PurchaseNumbersRequest,
    ) -> AppResult<Purchase> {
        if request.numbers.is_empty() {
            return Err(AppError::ValidationError("Select at least one number".into()));
        }

        let _guard = self.write_lock.lock().await;
        let raffle = self.load_raffle(raffle_id).await?;
        if raffle.winner.is_some() {
            return Err(AppError::ValidationError("Raffle already drawn".into()));
        }

        let mut requested = HashSet::new();
        for &number in &request.numbers {
            if number == 0 || number > raffle.max_numbers {
                return Err(AppError::ValidationError(format!(
                    "Number {number} is outside 1..={}",
                    raffle.max_numbers
                )));
            }
            if !requested.insert(number) {
                return Err(AppError::ValidationError(format!(
                    "Number {number} requested twice"
                )));
            }
        }

        let sold: HashSet<u32> = self.sold_numbers(raffle_id).await?.into_iter().collect();
        let mut taken: Vec<u32> = requested.intersection(&sold).copied().collect();
        if !taken.is_empty() {
            taken.sort_unstable();
            return Err(AppError::ValidationError(format!(
                "Numbers already sold: {taken:?}"
            )));
        }

        let mut numbers = request.numbers;
        numbers.sort_unstable();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            raffle_id,
            buyer_id,
            amount: numbers.len() as i64 * raffle.price_per_number,
            numbers,
            currency: raffle.currency.clone(),
            is_anonymous: raffle.is_anonymous,
            created_at: Utc::now(),
        };

        // 只写一次：抽签的购买列表同时是买家的购买记录
        append_as(
            self.store.as_ref(),
            &keys::raffle_purchases(raffle_id),
            &purchase,
        )
        .await?;

        log::info!(
            "User {} bought {} numbers on raffle {}",
            buyer_id,
            purchase.numbers.len(),
            raffle_id
        );
        Ok(purchase)
    }

    /// 用户购买记录（倒序）
    pub async fn my_purchases(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<Purchase>> {
        let mut purchases = self.purchases_by(user_id).await?;
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(PaginatedResponse::from_vec(purchases, params))
    }

    /// 我创建的抽签（含已售数量与收入）
    pub async fn list_created_by(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<RaffleResponse>> {
        let mut raffles: Vec<Raffle> = list_as::<Raffle>(self.store.as_ref(), keys::RAFFLES)
            .await?
            .into_iter()
            .filter(|r| r.creator_id == user_id)
            .collect();
        raffles.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = raffles.len() as i64;
        let mut items = Vec::new();
        for raffle in raffles
            .iter()
            .skip(params.get_offset() as usize)
            .take(params.get_limit() as usize)
        {
            let sold = self.sold_numbers(raffle.id).await?;
            items.push(RaffleResponse::new(raffle, sold, Some(user_id)));
        }
        Ok(PaginatedResponse::new(items, params, total))
    }

    /// `user_id` 在所有抽签中的购买记录
    pub(crate) async fn purchases_by(&self, user_id: Uuid) -> AppResult<Vec<Purchase>> {
        let raffles: Vec<Raffle> = list_as(self.store.as_ref(), keys::RAFFLES).await?;
        let mut purchases = Vec::new();
        for raffle in &raffles {
            let sold: Vec<Purchase> =
                list_as(self.store.as_ref(), &keys::raffle_purchases(raffle.id)).await?;
            purchases.extend(sold.into_iter().filter(|p| p.buyer_id == user_id));
        }
        Ok(purchases)
    }

    /// 在已售号码中均匀抽取中奖号码（仅创建者，且只能一次）
    pub async fn draw_winner(&self, user_id: Uuid, raffle_id: Uuid) -> AppResult<RaffleResponse> {
        let _guard = self.write_lock.lock().await;
        let mut raffles: Vec<Raffle> = list_as(self.store.as_ref(), keys::RAFFLES).await?;
        let raffle = raffles
            .iter_mut()
            .find(|r| r.id == raffle_id)
            .ok_or_else(|| AppError::NotFound(format!("Raffle {raffle_id}")))?;
        if raffle.creator_id != user_id {
            return Err(AppError::PermissionDenied);
        }
        if raffle.winner.is_some() {
            return Err(AppError::ValidationError("Raffle already drawn".into()));
        }

        let purchases: Vec<Purchase> =
            list_as(self.store.as_ref(), &keys::raffle_purchases(raffle_id)).await?;
        let mut tickets: Vec<(u32, Uuid)> = purchases
            .iter()
            .flat_map(|p| p.numbers.iter().map(move |&n| (n, p.buyer_id)))
            .collect();
        if tickets.is_empty() {
            return Err(AppError::ValidationError("No numbers sold yet".into()));
        }
        tickets.sort_unstable_by_key(|&(number, _)| number);

        let index = {
            let mut rng = self.rng.lock().await;
            rng.next_below(tickets.len() as u32) as usize
        };
        let (number, buyer_id) = tickets[index];
        raffle.winner = Some(RaffleWinner {
            number,
            buyer_id: Some(buyer_id),
            drawn_at: Utc::now(),
        });
        let drawn = raffle.clone();
        replace_as(self.store.as_ref(), keys::RAFFLES, &raffles).await?;

        log::info!(
            "Raffle {} drawn: number {} out of {} sold",
            raffle_id,
            number,
            tickets.len()
        );
        let sold = tickets.into_iter().map(|(n, _)| n).collect();
        Ok(RaffleResponse::new(&drawn, sold, Some(user_id)))
    }

    async fn load_raffle(&self, raffle_id: Uuid) -> AppResult<Raffle> {
        let raffles: Vec<Raffle> = list_as(self.store.as_ref(), keys::RAFFLES).await?;
        raffles
            .into_iter()
            .find(|r| r.id == raffle_id)
            .ok_or_else(|| AppError::NotFound(format!("Raffle {raffle_id}")))
    }

    async fn sold_numbers(&self, raffle_id: Uuid) -> AppResult<Vec<u32>> {
        let purchases: Vec<Purchase> =
            list_as(self.store.as_ref(), &keys::raffle_purchases(raffle_id)).await?;
        Ok(purchases.into_iter().flat_map(|p| p.numbers).collect())
    }
}
