pub mod account;
pub mod common;
pub mod gacha;
pub mod raffle;
pub mod user;

pub use account::*;
pub use common::*;
pub use gacha::*;
pub use raffle::*;
pub use user::*;
