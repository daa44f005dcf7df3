use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::{SharedStore, append_as, keys, list_as};
use crate::utils::*;

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    jwt_service: JwtService,
    // 邮箱唯一性检查与写入在同一把锁内完成
    register_lock: Arc<Mutex<()>>,
}

impl AuthService {
    pub fn new(store: SharedStore, jwt_service: JwtService) -> Self {
        Self {
            store,
            jwt_service,
            register_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn register(&self, request: CreateUserRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_username(&request.username)?;
        validate_password(&request.password, &email, &request.username)?;

        let _guard = self.register_lock.lock().await;
        let users = self.all_users().await?;

        if users.iter().any(|u| u.email == email) {
            return Err(AppError::ValidationError("Email already registered".to_string()));
        }

        // 处理推荐人
        let referrer_id = match request.referrer_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let referrer = users
                    .iter()
                    .find(|u| u.referral_code.eq_ignore_ascii_case(code))
                    .ok_or_else(|| AppError::ValidationError("Referrer not found".to_string()))?;
                Some(referrer.id)
            }
            _ => None,
        };

        let password_hash = hash_password(&request.password)?;
        let user = User {
            id: Uuid::new_v4(),
            email,
            username: request.username.trim().to_string(),
            password_hash,
            // 新存储上的第一个账号为管理员
            is_admin: users.is_empty(),
            referral_code: generate_referral_code(&users),
            referrer_id,
            created_at: Utc::now(),
        };

        append_as(self.store.as_ref(), keys::USERS, &user).await?;
        log::info!("User {} registered", user.id);

        self.issue_tokens(user)
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);
        let user = self
            .all_users()
            .await?
            .into_iter()
            .find(|u| u.email == email)
            .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        let is_valid = verify_password(&request.password, &user.password_hash)?;
        if !is_valid {
            return Err(AppError::AuthError("Invalid email or password".to_string()));
        }

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user = self.get_user_by_id(claims.user_id()?).await?;
        self.issue_tokens(user)
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<UserResponse> {
        Ok(self.get_user_by_id(user_id).await?.into())
    }

    async fn all_users(&self) -> AppResult<Vec<User>> {
        list_as(self.store.as_ref(), keys::USERS).await
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<User> {
        self.all_users()
            .await?
            .into_iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    fn issue_tokens(&self, user: User) -> AppResult<AuthResponse> {
        let access_token = self
            .jwt_service
            .generate_access_token(user.id, &user.username)?;
        let refresh_token = self
            .jwt_service
            .generate_refresh_token(user.id, &user.username)?;

        Ok(AuthResponse {
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

/// 生成8位推荐码（与已有用户不重复）
fn generate_referral_code(existing: &[User]) -> String {
    loop {
        let code: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect::<String>()
            .to_ascii_uppercase();
        if !existing.iter().any(|u| u.referral_code == code) {
            return code;
        }
    }
}
