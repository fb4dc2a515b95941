//! Product Scorer
//!
//! Orders product offers by a weighted blend of normalized price, rating and
//! review count.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const MAX_RATING: f64 = 5.0;
const WEIGHT_EPSILON: f64 = 1e-6;

/// A product offer from one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    /// Offers without a price are not ranked
    #[serde(default)]
    pub price: Option<f64>,
    /// Rating out of 5
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub reviews_count: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_availability")]
    pub availability: bool,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

fn default_availability() -> bool {
    true
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            rating: 0.0,
            reviews_count: 0,
            url: String::new(),
            source: String::new(),
            availability: true,
            specifications: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_rating(mut self, rating: f64, reviews_count: u64) -> Self {
        self.rating = rating;
        self.reviews_count = reviews_count;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

// =============================================================================
// Weights
// =============================================================================

/// Relative weight of each sub-score; must sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub price: f64,
    pub rating: f64,
    pub reviews: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: 0.4,
            rating: 0.4,
            reviews: 0.2,
        }
    }
}

impl RankingWeights {
    pub fn new(price: f64, rating: f64, reviews: f64) -> Result<Self> {
        let weights = Self {
            price,
            rating,
            reviews,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        let all = [self.price, self.rating, self.reviews];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Configuration(format!(
                "ranking weights must be non-negative, got {:?}",
                self
            )));
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(Error::Configuration(format!(
                "ranking weights must sum to 1, got {}",
                sum
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Ranking
// =============================================================================

/// A product with its sub-scores, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub price_score: f64,
    pub rating_score: f64,
    pub review_score: f64,
    pub score: f64,
}

/// Score products and sort them best first.
///
/// Products without a finite price are dropped. Ties keep input order.
pub fn rank_products(products: Vec<Product>, weights: &RankingWeights) -> Vec<RankedProduct> {
    let total = products.len();
    let priced: Vec<(f64, Product)> = products
        .into_iter()
        .filter_map(|p| match p.price {
            Some(price) if price.is_finite() => Some((price, p)),
            _ => None,
        })
        .collect();

    if priced.len() < total {
        debug!("Dropped {} products without a price", total - priced.len());
    }
    if priced.is_empty() {
        return Vec::new();
    }

    let min_price = priced.iter().map(|(p, _)| *p).fold(f64::INFINITY, f64::min);
    let max_price = priced.iter().map(|(p, _)| *p).fold(f64::NEG_INFINITY, f64::max);
    let max_reviews = priced.iter().map(|(_, p)| p.reviews_count).max().unwrap_or(0);
    let price_range = max_price - min_price;

    let mut ranked: Vec<RankedProduct> = priced
        .into_iter()
        .map(|(price, product)| {
            let price_score = if price_range > 0.0 {
                1.0 - (price - min_price) / price_range
            } else {
                1.0
            };
            let rating_score = (product.rating / MAX_RATING).clamp(0.0, 1.0);
            let review_score = if max_reviews > 0 {
                product.reviews_count as f64 / max_reviews as f64
            } else {
                0.0
            };
            let score = weights.price * price_score
                + weights.rating * rating_score
                + weights.reviews * review_score;

            RankedProduct {
                product,
                price_score,
                rating_score,
                review_score,
                score,
            }
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
