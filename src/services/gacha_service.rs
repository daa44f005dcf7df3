use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::GachaConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AttemptStatusResponse, Catalog, CreateGachaRequest, DrawHistoryPageResponse, DrawResult,
    Gacha, GachaResponse, NewPrize, PlayResponse, PricingResponse, PrizeEntry,
    PublicResultsResponse, RarityTier, TierCount, TierWeights, User,
};
use crate::services::attempt_counter::{AttemptCounter, AttemptKey, AttemptSlot};
use crate::services::prize_selector::{select_prize, validate_catalog, validate_weights};
use crate::store::{SharedStore, append_as, keys, list_as, replace_as};
use crate::utils::pricing::pricing_for;
use crate::utils::{
    PaginatedResponse, PaginationParams, SharedRandom, require_text, validate_currency,
};

const RECENT_PUBLIC_RESULTS: usize = 10;

#[derive(Clone)]
pub struct GachaService {
    store: SharedStore,
    rng: SharedRandom,
    attempts: AttemptCounter,
    limits: GachaConfig,
    // 串行化扭蛋机列表的读-改-写
    write_lock: Arc<Mutex<()>>,
}

impl GachaService {
    pub fn new(store: SharedStore, rng: SharedRandom, limits: GachaConfig) -> Self {
        Self {
            store,
            rng,
            attempts: AttemptCounter::new(),
            limits,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 创建扭蛋机；奖品与稀有度权重必须可直接抽取
    pub async fn create_gacha(
        &self,
        creator_id: Uuid,
        request: CreateGachaRequest,
    ) -> AppResult<GachaResponse> {
        require_text("title", &request.title, 120)?;
        validate_currency(&request.currency)?;
        if request.price_per_play < 0 {
            return Err(AppError::ValidationError(
                "Price per play cannot be negative".into(),
            ));
        }
        self.check_max_attempts(request.max_attempts_per_person)?;

        let prizes = request
            .prizes
            .into_iter()
            .map(build_prize)
            .collect::<AppResult<Vec<_>>>()?;
        let catalog = Catalog::new(prizes, request.tier_weights);
        self.check_catalog(&catalog)?;

        let gacha = Gacha {
            id: Uuid::new_v4(),
            creator_id,
            title: request.title.trim().to_string(),
            description: request.description,
            price_per_play: request.price_per_play,
            currency: request.currency,
            max_attempts_per_person: request.max_attempts_per_person,
            catalog,
            show_animation: request.show_animation,
            show_prize_list: request.show_prize_list,
            show_public_results: request.show_public_results,
            featured: false,
            created_at: Utc::now(),
        };

        {
            let _guard = self.write_lock.lock().await;
            append_as(self.store.as_ref(), keys::GACHAS, &gacha).await?;
        }
        log::info!(
            "Gacha {} created by {} with {} prizes",
            gacha.id,
            creator_id,
            gacha.catalog.prizes.len()
        );

        Ok(GachaResponse::from_gacha(&gacha, Some(creator_id)))
    }

    /// 推荐优先，其次按创建时间倒序
    pub async fn list_gachas(
        &self,
        params: &PaginationParams,
        viewer: Option<Uuid>,
    ) -> AppResult<PaginatedResponse<GachaResponse>> {
        let mut gachas = self.all_gachas().await?;
        gachas.sort_by(|a, b| {
            b.featured
                .cmp(&a.featured)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        let views = gachas
            .iter()
            .map(|g| GachaResponse::from_gacha(g, viewer))
            .collect();
        Ok(PaginatedResponse::from_vec(views, params))
    }

    pub async fn list_created_by(
        &self,
        user_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<GachaResponse>> {
        let mut gachas: Vec<Gacha> = self
            .all_gachas()
            .await?
            .into_iter()
            .filter(|g| g.creator_id == user_id)
            .collect();
        gachas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let views = gachas
            .iter()
            .map(|g| GachaResponse::from_gacha(g, Some(user_id)))
            .collect();
        Ok(PaginatedResponse::from_vec(views, params))
    }

    pub async fn get_gacha(&self, gacha_id: Uuid, viewer: Option<Uuid>) -> AppResult<GachaResponse> {
        let gacha = self.load_gacha(gacha_id).await?;
        Ok(GachaResponse::from_gacha(&gacha, viewer))
    }

    pub async fn add_prize(
        &self,
        user_id: Uuid,
        gacha_id: Uuid,
        prize: NewPrize,
    ) -> AppResult<GachaResponse> {
        let prize = build_prize(prize)?;
        let gacha = self
            .edit_gacha(user_id, gacha_id, |gacha| {
                gacha.catalog.prizes.push(prize);
                Ok(())
            })
            .await?;
        Ok(GachaResponse::from_gacha(&gacha, Some(user_id)))
    }

    pub async fn remove_prize(
        &self,
        user_id: Uuid,
        gacha_id: Uuid,
        prize_id: &str,
    ) -> AppResult<GachaResponse> {
        let gacha = self
            .edit_gacha(user_id, gacha_id, |gacha| {
                let before = gacha.catalog.prizes.len();
                gacha.catalog.prizes.retain(|p| p.id != prize_id);
                if gacha.catalog.prizes.len() == before {
                    return Err(AppError::NotFound(format!("Prize {prize_id}")));
                }
                Ok(())
            })
            .await?;
        Ok(GachaResponse::from_gacha(&gacha, Some(user_id)))
    }

    /// 替换稀有度权重；展示概率在读取时计算，随之更新
    pub async fn update_tier_weights(
        &self,
        user_id: Uuid,
        gacha_id: Uuid,
        weights: TierWeights,
    ) -> AppResult<GachaResponse> {
        let gacha = self
            .edit_gacha(user_id, gacha_id, |gacha| {
                gacha.catalog.tier_weights = weights;
                Ok(())
            })
            .await?;
        Ok(GachaResponse::from_gacha(&gacha, Some(user_id)))
    }

    /// 管理员设置推荐
    pub async fn set_featured(
        &self,
        user_id: Uuid,
        gacha_id: Uuid,
        featured: bool,
    ) -> AppResult<GachaResponse> {
        let users: Vec<User> = list_as(self.store.as_ref(), keys::USERS).await?;
        if !users.iter().any(|u| u.id == user_id && u.is_admin) {
            return Err(AppError::PermissionDenied);
        }

        let _guard = self.write_lock.lock().await;
        let mut gachas = self.all_gachas().await?;
        let gacha = gachas
            .iter_mut()
            .find(|g| g.id == gacha_id)
            .ok_or_else(|| AppError::NotFound(format!("Gacha {gacha_id}")))?;
        gacha.featured = featured;
        let updated = gacha.clone();
        replace_as(self.store.as_ref(), keys::GACHAS, &gachas).await?;
        Ok(GachaResponse::from_gacha(&updated, Some(user_id)))
    }

    /// 进行一次抽取:
    /// 1. 检查剩余次数
    /// 2. 按稀有度权重选择奖品
    /// 3. 记录结果并增加已用次数
    pub async fn play(&self, user_id: Uuid, gacha_id: Uuid) -> AppResult<PlayResponse> {
        let gacha = self.load_gacha(gacha_id).await?;
        let key = AttemptKey { user_id, gacha_id };

        let mut slot = self.attempts.lock(key).await;
        let recorded = self.record_draw(&gacha, user_id, &mut slot).await;
        self.attempts.release(key, slot).await;
        let result = recorded?;
        let max = gacha.max_attempts_per_person;

        // 仅用于公开统计，写入失败不影响已记录的抽取
        if let Err(e) =
            append_as(self.store.as_ref(), &keys::gacha_results(gacha_id), &result).await
        {
            log::error!(
                "Draw {} recorded but missing from public results of gacha {}: {}",
                result.id,
                gacha_id,
                e
            );
        }

        log::info!(
            "User {} drew {} prize {} on gacha {} (attempt {}/{})",
            user_id,
            result.prize.tier,
            result.prize.id,
            gacha_id,
            result.attempt,
            max
        );

        Ok(PlayResponse {
            celebrate: result.prize.tier.is_celebrated(),
            show_animation: gacha.show_animation,
            attempts_used: result.attempt,
            remaining_attempts: max - result.attempt,
            result,
        })
    }

    pub async fn attempts(&self, user_id: Uuid, gacha_id: Uuid) -> AppResult<AttemptStatusResponse> {
        let gacha = self.load_gacha(gacha_id).await?;
        let key = AttemptKey { user_id, gacha_id };
        let used = match self.attempts.peek(key).await {
            Some(used) => used,
            None => self.recorded_attempts(gacha_id, user_id).await?,
        };
        let max = gacha.max_attempts_per_person;
        Ok(AttemptStatusResponse {
            used,
            max,
            remaining: max.saturating_sub(used),
        })
    }

    /// 分页获取用户在某扭蛋机的抽取记录（倒序）
    pub async fn history(
        &self,
        user_id: Uuid,
        gacha_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<DrawHistoryPageResponse> {
        self.load_gacha(gacha_id).await?;
        let mut results: Vec<DrawResult> = list_as(
            self.store.as_ref(),
            &keys::user_gacha_results(gacha_id, user_id),
        )
        .await?;
        results.reverse();
        Ok(PaginatedResponse::from_vec(results, params))
    }

    pub async fn public_results(
        &self,
        gacha_id: Uuid,
        viewer: Option<Uuid>,
    ) -> AppResult<PublicResultsResponse> {
        let gacha = self.load_gacha(gacha_id).await?;
        if !gacha.show_public_results && viewer != Some(gacha.creator_id) {
            return Err(AppError::Forbidden);
        }

        let results: Vec<DrawResult> =
            list_as(self.store.as_ref(), &keys::gacha_results(gacha_id)).await?;
        let mut counts: HashMap<RarityTier, u64> = HashMap::new();
        for result in &results {
            *counts.entry(result.prize.tier).or_default() += 1;
        }
        let by_tier = RarityTier::ALL
            .iter()
            .map(|&tier| TierCount {
                tier,
                count: counts.get(&tier).copied().unwrap_or(0),
            })
            .collect();
        let recent = results
            .iter()
            .rev()
            .take(RECENT_PUBLIC_RESULTS)
            .cloned()
            .collect();

        Ok(PublicResultsResponse {
            total_draws: results.len() as u64,
            by_tier,
            recent,
        })
    }

    pub async fn pricing(&self, gacha_id: Uuid) -> AppResult<PricingResponse> {
        let gacha = self.load_gacha(gacha_id).await?;
        Ok(pricing_for(&gacha.catalog.tier_weights))
    }

    /// 尚未创建扭蛋机时按权重预估价格
    pub fn preview_pricing(&self, weights: &TierWeights) -> AppResult<PricingResponse> {
        validate_weights(weights)?;
        Ok(pricing_for(weights))
    }

    // -----------------------------
    // 内部辅助函数
    // -----------------------------

    async fn all_gachas(&self) -> AppResult<Vec<Gacha>> {
        list_as(self.store.as_ref(), keys::GACHAS).await
    }

    async fn load_gacha(&self, gacha_id: Uuid) -> AppResult<Gacha> {
        self.all_gachas()
            .await?
            .into_iter()
            .find(|g| g.id == gacha_id)
            .ok_or_else(|| AppError::NotFound(format!("Gacha {gacha_id}")))
    }

    async fn recorded_attempts(&self, gacha_id: Uuid, user_id: Uuid) -> AppResult<u32> {
        let history = self
            .store
            .list(&keys::user_gacha_results(gacha_id, user_id))
            .await?;
        Ok(history.len() as u32)
    }

    fn check_max_attempts(&self, max_attempts: u32) -> AppResult<()> {
        if max_attempts == 0 || max_attempts > self.limits.max_attempts_limit {
            return Err(AppError::ValidationError(format!(
                "Max attempts per person must be between 1 and {}",
                self.limits.max_attempts_limit
            )));
        }
        Ok(())
    }

    fn check_catalog(&self, catalog: &Catalog) -> AppResult<()> {
        if catalog.prizes.len() > self.limits.max_prizes {
            return Err(AppError::ValidationError(format!(
                "A gacha can hold at most {} prizes",
                self.limits.max_prizes
            )));
        }
        validate_catalog(catalog)?;
        Ok(())
    }

    /// 持有槽位时检查次数、抽取并写入用户历史
    async fn record_draw(
        &self,
        gacha: &Gacha,
        user_id: Uuid,
        slot: &mut AttemptSlot,
    ) -> AppResult<DrawResult> {
        let used = match **slot {
            Some(used) => used,
            None => self.recorded_attempts(gacha.id, user_id).await?,
        };
        **slot = Some(used);

        if used >= gacha.max_attempts_per_person {
            return Err(AppError::ValidationError("No remaining attempts".into()));
        }

        let prize = {
            let mut rng = self.rng.lock().await;
            select_prize(&gacha.catalog, &mut **rng)?
        };

        let result = DrawResult {
            id: Uuid::new_v4(),
            gacha_id: gacha.id,
            user_id,
            prize,
            attempt: used + 1,
            created_at: Utc::now(),
        };

        // 计数由用户历史初始化，历史写入成功后才增加计数
        append_as(
            self.store.as_ref(),
            &keys::user_gacha_results(gacha.id, user_id),
            &result,
        )
        .await?;
        **slot = Some(result.attempt);
        Ok(result)
    }

    /// 应用创建者的修改，结果可抽取时才保存
    async fn edit_gacha<F>(&self, user_id: Uuid, gacha_id: Uuid, edit: F) -> AppResult<Gacha>
    where
        F: FnOnce(&mut Gacha) -> AppResult<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut gachas = self.all_gachas().await?;
        let gacha = gachas
            .iter_mut()
            .find(|g| g.id == gacha_id)
            .ok_or_else(|| AppError::NotFound(format!("Gacha {gacha_id}")))?;
        if gacha.creator_id != user_id {
            return Err(AppError::PermissionDenied);
        }

        edit(gacha)?;
        self.check_catalog(&gacha.catalog)?;

        let updated = gacha.clone();
        replace_as(self.store.as_ref(), keys::GACHAS, &gachas).await?;
        Ok(updated)
    }
}

fn build_prize(prize: NewPrize) -> AppResult<PrizeEntry> {
    require_text("prize name", &prize.name, 80)?;
    if prize.description.chars().count() > 500 {
        return Err(AppError::ValidationError(
            "Prize description must be at most 500 characters".into(),
        ));
    }
    require_text("visual tag", &prize.visual_tag, 32)?;
    if !(1..=5).contains(&prize.emotion_level) {
        return Err(AppError::ValidationError(
            "Emotion level must be between 1 and 5".into(),
        ));
    }

    Ok(PrizeEntry {
        id: Uuid::new_v4().to_string(),
        name: prize.name.trim().to_string(),
        description: prize.description,
        tier: prize.tier,
        visual_tag: prize.visual_tag,
        image_ref: prize.image_ref,
        emotion_level: prize.emotion_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::prize_selector::SelectionError;
    use crate::store::{FailingWrites, MemoryStore};
    use crate::utils::{ScriptedSource, shared};

    fn new_prize(name: &str, tier: RarityTier) -> NewPrize {
        NewPrize {
            name: name.to_string(),
            description: String::new(),
            tier,
            visual_tag: "#ff6b9d".to_string(),
            image_ref: None,
            emotion_level: 3,
        }
    }

    fn request(max_attempts: u32) -> CreateGachaRequest {
        CreateGachaRequest {
            title: "Summer capsules".to_string(),
            description: String::new(),
            price_per_play: 1000,
            currency: "CLP".to_string(),
            max_attempts_per_person: max_attempts,
            prizes: vec![
                new_prize("A", RarityTier::Common),
                new_prize("B", RarityTier::Rare),
                new_prize("C", RarityTier::Epic),
                new_prize("D", RarityTier::Legendary),
            ],
            tier_weights: TierWeights::default(),
            show_animation: true,
            show_prize_list: true,
            show_public_results: true,
        }
    }

    fn service(script: Vec<u32>) -> GachaService {
        GachaService::new(
            Arc::new(MemoryStore::new()),
            shared(ScriptedSource::new(script)),
            GachaConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_bad_weights() {
        let svc = service(vec![0]);
        let mut req = request(3);
        req.tier_weights.common = 59;
        let err = svc.create_gacha(Uuid::new_v4(), req).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::SelectionError(SelectionError::InvalidWeights { total: 99 })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_and_oversized_catalogs() {
        let svc = service(vec![0]);
        let mut empty = request(3);
        empty.prizes.clear();
        assert!(matches!(
            svc.create_gacha(Uuid::new_v4(), empty).await,
            Err(AppError::SelectionError(SelectionError::EmptyCatalog))
        ));

        let mut big = request(3);
        big.prizes = (0..31)
            .map(|i| new_prize(&format!("p{i}"), RarityTier::Common))
            .collect();
        big.tier_weights = TierWeights {
            common: 100,
            rare: 0,
            epic: 0,
            legendary: 0,
        };
        assert!(matches!(
            svc.create_gacha(Uuid::new_v4(), big).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_play_follows_scripted_rolls_and_celebrates() {
        // 先抽到普通，再抽到传说
        let svc = service(vec![30, 0, 98, 0]);
        let creator = Uuid::new_v4();
        let player = Uuid::new_v4();
        let gacha = svc.create_gacha(creator, request(5)).await.unwrap();

        let first = svc.play(player, gacha.id).await.unwrap();
        assert_eq!(first.result.prize.name, "A");
        assert!(!first.celebrate);
        assert_eq!(first.result.attempt, 1);
        assert_eq!(first.remaining_attempts, 4);

        let second = svc.play(player, gacha.id).await.unwrap();
        assert_eq!(second.result.prize.name, "D");
        assert!(second.celebrate);
        assert_eq!(second.attempts_used, 2);

        let history = svc
            .history(player, gacha.id, &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(history.pagination.total, 2);
        assert_eq!(history.items[0].prize.name, "D");
    }

    #[tokio::test]
    async fn test_attempt_cap_enforced() {
        let svc = service(vec![10, 0]);
        let player = Uuid::new_v4();
        let gacha = svc.create_gacha(Uuid::new_v4(), request(2)).await.unwrap();

        svc.play(player, gacha.id).await.unwrap();
        svc.play(player, gacha.id).await.unwrap();
        assert!(matches!(
            svc.play(player, gacha.id).await,
            Err(AppError::ValidationError(_))
        ));

        let status = svc.attempts(player, gacha.id).await.unwrap();
        assert_eq!((status.used, status.max, status.remaining), (2, 2, 0));

        // 其他用户的计数相互独立
        assert!(svc.play(Uuid::new_v4(), gacha.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_plays_never_exceed_cap() {
        let svc = service(vec![10, 0, 70, 0]);
        let player = Uuid::new_v4();
        let gacha = svc.create_gacha(Uuid::new_v4(), request(3)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..12 {
            let svc = svc.clone();
            let gacha_id = gacha.id;
            handles.push(tokio::spawn(async move { svc.play(player, gacha_id).await }));
        }
        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 3);

        let history = svc
            .history(player, gacha.id, &PaginationParams::default())
            .await
            .unwrap();
        let mut attempts: Vec<u32> = history.items.iter().map(|r| r.attempt).collect();
        attempts.sort_unstable();
        assert_eq!(attempts, vec![1, 2, 3]);
        // 空闲槽位已释放
        assert_eq!(svc.attempts.tracked().await, 0);
    }

    #[tokio::test]
    async fn test_counter_seeded_from_existing_history() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let first = GachaService::new(
            store.clone(),
            shared(ScriptedSource::new(vec![0])),
            GachaConfig::default(),
        );
        let player = Uuid::new_v4();
        let gacha = first.create_gacha(Uuid::new_v4(), request(2)).await.unwrap();
        first.play(player, gacha.id).await.unwrap();

        // 同一存储上的新服务实例，相当于重启
        let second = GachaService::new(
            store,
            shared(ScriptedSource::new(vec![0])),
            GachaConfig::default(),
        );
        let status = second.attempts(player, gacha.id).await.unwrap();
        assert_eq!(status.used, 1);
        let played = second.play(player, gacha.id).await.unwrap();
        assert_eq!(played.result.attempt, 2);
        assert!(second.play(player, gacha.id).await.is_err());
    }

    #[tokio::test]
    async fn test_edits_keep_catalog_playable() {
        let svc = service(vec![0]);
        let creator = Uuid::new_v4();
        let gacha = svc.create_gacha(creator, request(3)).await.unwrap();
        let legendary_id = gacha
            .prizes
            .iter()
            .find(|p| p.prize.tier == RarityTier::Legendary)
            .map(|p| p.prize.id.clone())
            .unwrap();

        // 移除唯一的传说奖品会让 3% 的权重无法抽到
        assert!(matches!(
            svc.remove_prize(creator, gacha.id, &legendary_id).await,
            Err(AppError::SelectionError(SelectionError::UnreachableTier(
                RarityTier::Legendary
            )))
        ));

        // 仅创建者可修改
        assert!(matches!(
            svc.add_prize(Uuid::new_v4(), gacha.id, new_prize("E", RarityTier::Rare))
                .await,
            Err(AppError::PermissionDenied)
        ));

        let updated = svc
            .add_prize(creator, gacha.id, new_prize("E", RarityTier::Rare))
            .await
            .unwrap();
        assert_eq!(updated.prize_count, 5);
        let rare: Vec<_> = updated
            .prizes
            .iter()
            .filter(|p| p.prize.tier == RarityTier::Rare)
            .collect();
        assert!(rare.iter().all(|p| p.probability == 25));
        assert!(
            rare.iter()
                .all(|p| (p.effective_probability - 12.5).abs() < 1e-9)
        );

        let reweighted = svc
            .update_tier_weights(
                creator,
                gacha.id,
                TierWeights {
                    common: 50,
                    rare: 30,
                    epic: 15,
                    legendary: 5,
                },
            )
            .await
            .unwrap();
        assert!(
            reweighted
                .prizes
                .iter()
                .filter(|p| p.prize.tier == RarityTier::Rare)
                .all(|p| p.probability == 30)
        );

        assert!(
            svc.update_tier_weights(
                creator,
                gacha.id,
                TierWeights {
                    common: 50,
                    rare: 30,
                    epic: 15,
                    legendary: 6,
                },
            )
            .await
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_public_results_counts_by_tier() {
        let svc = service(vec![30, 0, 61, 0, 40, 0]);
        let creator = Uuid::new_v4();
        let gacha = svc.create_gacha(creator, request(5)).await.unwrap();
        let player = Uuid::new_v4();
        for _ in 0..3 {
            svc.play(player, gacha.id).await.unwrap();
        }

        let results = svc.public_results(gacha.id, None).await.unwrap();
        assert_eq!(results.total_draws, 3);
        let common = results
            .by_tier
            .iter()
            .find(|c| c.tier == RarityTier::Common)
            .unwrap();
        assert_eq!(common.count, 2);
        assert_eq!(results.recent[0].prize.name, "A");
        assert_eq!(results.recent[1].prize.name, "B");
    }

    #[tokio::test]
    async fn test_private_results_hidden_from_players() {
        let svc = service(vec![0]);
        let creator = Uuid::new_v4();
        let mut req = request(5);
        req.show_public_results = false;
        let gacha = svc.create_gacha(creator, req).await.unwrap();

        assert!(matches!(
            svc.public_results(gacha.id, Some(Uuid::new_v4())).await,
            Err(AppError::Forbidden)
        ));
        assert!(svc.public_results(gacha.id, Some(creator)).await.is_ok());
    }

    async fn single_play_gacha(store: SharedStore) -> (GachaService, Uuid) {
        let svc = GachaService::new(
            store,
            shared(ScriptedSource::new(vec![30, 0])),
            GachaConfig::default(),
        );
        let gacha = svc.create_gacha(Uuid::new_v4(), request(1)).await.unwrap();
        (svc, gacha.id)
    }

    fn is_public_results_key(key: &str) -> bool {
        key.starts_with("gacha_results:") && key.matches(':').count() == 1
    }

    fn is_user_results_key(key: &str) -> bool {
        key.starts_with("gacha_results:") && key.matches(':').count() == 2
    }

    #[tokio::test]
    async fn test_failed_public_results_write_keeps_recorded_play() {
        let store: SharedStore = Arc::new(FailingWrites::new(is_public_results_key));
        let (svc, gacha_id) = single_play_gacha(store).await;
        let player = Uuid::new_v4();

        let played = svc.play(player, gacha_id).await.unwrap();
        assert_eq!(played.result.attempt, 1);

        let status = svc.attempts(player, gacha_id).await.unwrap();
        assert_eq!((status.used, status.remaining), (1, 0));
        let history = svc
            .history(player, gacha_id, &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(history.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_failed_history_write_consumes_no_attempt() {
        let store: SharedStore = Arc::new(FailingWrites::new(is_user_results_key));
        let (svc, gacha_id) = single_play_gacha(store).await;
        let player = Uuid::new_v4();

        assert!(matches!(
            svc.play(player, gacha_id).await,
            Err(AppError::StoreError(_))
        ));

        let status = svc.attempts(player, gacha_id).await.unwrap();
        assert_eq!((status.used, status.remaining), (0, 1));
        let history = svc
            .history(player, gacha_id, &PaginationParams::default())
            .await
            .unwrap();
        assert_eq!(history.pagination.total, 0);
        let public = svc.public_results(gacha_id, None).await.unwrap();
        assert_eq!(public.total_draws, 0);
    }

    #[tokio::test]
    async fn test_unknown_gacha() {
        let svc = service(vec![0]);
        assert!(matches!(
            svc.play(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_pricing_validates_weights() {
        let svc = service(vec![0]);
        assert_eq!(
            svc.preview_pricing(&TierWeights::default())
                .unwrap()
                .recommended_price,
            1892
        );
        assert!(
            svc.preview_pricing(&TierWeights {
                common: 1,
                rare: 0,
                epic: 0,
                legendary: 0,
            })
            .is_err()
        );
    }
}
