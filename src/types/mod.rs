//! Core domain types shared across the herald.

pub mod ids;
pub mod money;

pub use ids::{CrsCode, Domain, InvalidCrsCode, ParseDomainError, RecipientId};
pub use money::{ParsePenceError, Pence};
