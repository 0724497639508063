use crate::error::{RecError, Result};
use crate::types::{Behavior, RawEvent, WeightedInteraction};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// 生イベントを重みに変換するときの係数
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeightingConfig {
    pub purchase_weight: f32,
    pub play_weight: f32,
    /// プレイ時間の下限。0時間のプレイでも log1p が潰れないようにする
    pub min_play_hours: f32,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            purchase_weight: 1.0,
            play_weight: 1.0,
            min_play_hours: 0.1,
        }
    }
}

impl WeightingConfig {
    /// JSON ファイルから読む。書かれていない項目はデフォルト値
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json_string = std::fs::read_to_string(path)?;
        Self::from_json(json_string.as_str())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn weight(&self, behavior: Behavior, value: f32) -> f32 {
        match behavior {
            Behavior::Purchase => self.purchase_weight,
            Behavior::Play => value.max(self.min_play_hours).ln_1p() * self.play_weight,
        }
    }
}

/// behavior の種類を入力全体で一度だけ検証する
pub fn validate_behaviors(events: &[RawEvent]) -> Result<()> {
    let unexpected: BTreeSet<&str> = events
        .iter()
        .map(|e| e.behavior.as_str())
        .filter(|b| Behavior::parse(b).is_none())
        .collect();

    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(RecError::Schema {
            unexpected: unexpected.into_iter().map(str::to_string).collect(),
        })
    }
}

/// 生イベントを (user_id, game) ごとに合算した重み付きインタラクションに変換する。
///
/// 出力は (user_id, game) の昇順。合算後の重みが 0 以下の行は捨てる。
pub fn build_implicit_interactions(
    events: &[RawEvent],
    config: &WeightingConfig,
) -> Result<Vec<WeightedInteraction>> {
    validate_behaviors(events)?;

    let mut totals: BTreeMap<(u64, &str), f64> = BTreeMap::new();
    for event in events {
        let Some(behavior) = Behavior::parse(&event.behavior) else {
            continue;
        };
        let weight = config.weight(behavior, event.value);
        *totals
            .entry((event.user_id, event.game.as_str()))
            .or_insert(0.0) += f64::from(weight);
    }
    debug!(events = events.len(), pairs = totals.len(), "aggregated raw events");

    let interactions: Vec<WeightedInteraction> = totals
        .into_iter()
        .map(|((user_id, game), weight)| WeightedInteraction::new(user_id, game, weight as f32))
        .filter(|x| x.weight > 0.0)
        .collect();

    info!(interactions = interactions.len(), "built implicit interactions");
    Ok(interactions)
}
