//! Steam の購入・プレイ履歴からゲームを推薦する。
//!
//! 生イベント → 重み付きインタラクション → 索引 → 疎行列 → 推薦、の一方向の流れ。

pub mod cf_model;
pub mod datasets;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod recommenders;
pub mod types;
pub mod weighting;

pub use cf_model::{ItemCFRecommender, PrecomputedItemCF};
pub use datasets::{load_steam_200k_csv, Dataset, IdEncoder};
pub use error::{RecError, Result};
pub use matrix::SparseWeightMatrix;
pub use recommenders::{FallbackBlend, PopularityRecommender, RecommendContext, Recommender};
pub use types::{Behavior, RawEvent, Recommendation, WeightedInteraction};
pub use weighting::{build_implicit_interactions, WeightingConfig};
