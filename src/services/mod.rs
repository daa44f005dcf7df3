pub mod account_service;
pub mod attempt_counter;
pub mod auth_service;
pub mod gacha_service;
pub mod prize_selector;
pub mod raffle_service;

pub use account_service::*;
pub use attempt_counter::*;
pub use auth_service::*;
pub use gacha_service::*;
pub use prize_selector::{SelectionError, select_prize, validate_catalog, validate_weights};
pub use raffle_service::*;
