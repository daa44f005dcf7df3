use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct PaginationParams {
    /// 页码 (默认 1)
    pub page: Option<u32>,
    /// 每页数量 (默认 20, 最大 100)
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl PaginationParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page, per_page }
    }

    pub fn get_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn get_per_page(&self) -> u32 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    /// 页码过大时饱和，返回空页
    pub fn get_offset(&self) -> u32 {
        (self.get_page() - 1).saturating_mul(self.get_per_page())
    }

    pub fn get_limit(&self) -> u32 {
        self.get_per_page()
    }
}

impl PaginationInfo {
    pub fn new(current_page: u32, per_page: u32, total: i64) -> Self {
        let total_pages = if total == 0 {
            1
        } else {
            ((total as f64) / (per_page as f64)).ceil() as u32
        };

        Self {
            current_page,
            per_page,
            total,
            total_pages,
        }
    }
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        let pagination = PaginationInfo::new(params.get_page(), params.get_per_page(), total);

        Self { items, pagination }
    }

    /// 从已排序的列表中截取一页
    pub fn from_vec(all: Vec<T>, params: &PaginationParams) -> Self {
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(params.get_offset() as usize)
            .take(params.get_limit() as usize)
            .collect();
        Self::new(items, params, total)
    }
}
