pub mod jwt;
pub mod pagination;
pub mod password;
pub mod pricing;
pub mod random;
pub mod validation;

pub use jwt::*;
pub use pagination::*;
pub use password::*;
pub use random::{RandomSource, RngSource, ScriptedSource, SharedRandom, shared, source_from_seed};
pub use validation::*;
