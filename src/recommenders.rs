use crate::cf_model::{ItemCFRecommender, PrecomputedItemCF};
use crate::error::Result;
use crate::types::{Recommendation, WeightedInteraction};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// 推薦一回分の問い合わせ
#[derive(Debug, Clone, Default)]
pub struct RecommendContext {
    /// Dataset で解決済みのユーザーインデックス。人気順だけなら不要
    pub user_index: Option<usize>,
    pub n: usize,
    /// 結果から除外するタイトル (所有済み、推薦済みなど)
    pub exclude: HashSet<String>,
}

impl RecommendContext {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn for_user(user_index: usize, n: usize) -> Self {
        Self {
            user_index: Some(user_index),
            n,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, titles: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(titles);
        self
    }
}

/// 推薦戦略。n 件に満たない結果もエラーではない。
pub trait Recommender {
    fn recommend(&self, ctx: &RecommendContext) -> Result<Vec<Recommendation>>;
}

pub struct PopularityRecommender {
    /// スコア降順。同点はタイトル昇順
    ranked: Vec<Recommendation>,
}

impl PopularityRecommender {
    pub fn new(interactions: &[WeightedInteraction]) -> Self {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for interaction in interactions {
            *totals.entry(interaction.game.as_str()).or_insert(0.0) += f64::from(interaction.weight);
        }

        let mut ranked: Vec<Recommendation> = totals
            .into_iter()
            .map(|(title, score)| Recommendation {
                title: title.to_string(),
                score: score as f32,
            })
            .collect();
        // 安定ソートなので同点はタイトル順のまま
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(games = ranked.len(), "ranked games by popularity");

        Self { ranked }
    }

    /// 人気順に exclude を飛ばしながら最大 n 件
    pub fn top_n(&self, n: usize, exclude: &HashSet<String>) -> Vec<Recommendation> {
        self.ranked
            .iter()
            .filter(|r| !exclude.contains(&r.title))
            .take(n)
            .cloned()
            .collect()
    }
}

impl Recommender for PopularityRecommender {
    fn recommend(&self, ctx: &RecommendContext) -> Result<Vec<Recommendation>> {
        Ok(self.top_n(ctx.n, &ctx.exclude))
    }
}

impl Recommender for ItemCFRecommender<'_> {
    /// user_index がなければ空
    fn recommend(&self, ctx: &RecommendContext) -> Result<Vec<Recommendation>> {
        let Some(user_index) = ctx.user_index else {
            return Ok(Vec::new());
        };
        Ok(self.recommend_excluding(user_index, ctx.n, &ctx.exclude))
    }
}

impl Recommender for PrecomputedItemCF<'_> {
    fn recommend(&self, ctx: &RecommendContext) -> Result<Vec<Recommendation>> {
        let Some(user_index) = ctx.user_index else {
            return Ok(Vec::new());
        };
        self.recommend_excluding(user_index, ctx.n, &ctx.exclude)
    }
}

/// primary が n 件に満たなければ、残りを fallback で埋める
pub struct FallbackBlend<'a> {
    pub primary: &'a dyn Recommender,
    pub fallback: &'a dyn Recommender,
}

impl Recommender for FallbackBlend<'_> {
    fn recommend(&self, ctx: &RecommendContext) -> Result<Vec<Recommendation>> {
        let mut recs = self.primary.recommend(ctx)?;
        if recs.len() >= ctx.n {
            return Ok(recs);
        }

        let fill_ctx = RecommendContext {
            user_index: ctx.user_index,
            n: ctx.n - recs.len(),
            exclude: ctx.exclude.clone(),
        }
        .excluding(recs.iter().map(|r| r.title.clone()));
        let fill = self.fallback.recommend(&fill_ctx)?;
        debug!(primary = recs.len(), fill = fill.len(), "filled recommendations from fallback");

        recs.extend(fill);
        Ok(recs)
    }
}
