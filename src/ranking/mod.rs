//! Product Ranking
//!
//! Weighted price/rating/review ranking of product offers.

pub mod scorer;

pub use scorer::*;
