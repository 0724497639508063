use crate::error::Result;
use crate::matrix::SparseWeightMatrix;
use crate::types::Recommendation;
use candle_core::{Device, Tensor};
use sprs::{CsMat, CsVec, TriMat};
use std::collections::HashSet;
use tracing::{debug, warn};

/// アイテムベース協調フィルタリング。
///
/// アイテム × ユーザー行列を行ごとにL2正規化した `NormItem` を持ち、
/// `score = NormItem · (NormItemᵗ · profile)` でスコアを計算する。
/// アイテム × アイテムの類似度行列は作らない。
pub struct ItemCFRecommender<'a> {
    user_item: &'a SparseWeightMatrix,
    game_titles: &'a [String],
    /// (items, users)
    item_user_norm: CsMat<f32>,
    /// (users, items)。item_user_norm の転置
    user_item_norm: CsMat<f32>,
}

impl<'a> ItemCFRecommender<'a> {
    pub fn new(user_item: &'a SparseWeightMatrix, game_titles: &'a [String]) -> Self {
        let (n_users, n_items) = user_item.shape();
        let norms = user_item.item_norms();

        let mut item_user = TriMat::with_capacity((n_items, n_users), user_item.nnz());
        let mut user_item_t = TriMat::with_capacity((n_users, n_items), user_item.nnz());
        for (u, i, w) in user_item.entries() {
            let v = w / norms[i];
            item_user.add_triplet(i, u, v);
            user_item_t.add_triplet(u, i, v);
        }
        debug!(items = n_items, users = n_users, "normalized item vectors");

        Self {
            user_item,
            game_titles,
            item_user_norm: item_user.to_csr(),
            user_item_norm: user_item_t.to_csr(),
        }
    }

    /// 全アイテムのスコア。所有アイテムは -inf。プロフィールが空なら None。
    pub fn scores_for_user(&self, user_index: usize) -> Option<Vec<f32>> {
        let Some(profile) = self.user_item.row(user_index) else {
            warn!(user_index, "user index out of range");
            return None;
        };
        if profile.nnz() == 0 {
            return None;
        }

        // ユーザー方向の親和度 -> アイテム方向へ戻す
        let affinity: CsVec<f32> = &self.user_item_norm * &profile;
        let propagated: CsVec<f32> = &self.item_user_norm * &affinity;

        let mut scores = vec![0.0f32; self.user_item.n_items()];
        for (j, &s) in propagated.iter() {
            scores[j] = s;
        }
        for &i in profile.indices() {
            scores[i] = f32::NEG_INFINITY;
        }
        Some(scores)
    }

    pub fn recommend_for_user(&self, user_index: usize, n: usize) -> Vec<Recommendation> {
        self.recommend_excluding(user_index, n, &HashSet::new())
    }

    /// exclude のタイトルは上位 n 件を選ぶ前に候補から外す
    pub fn recommend_excluding(
        &self,
        user_index: usize,
        n: usize,
        exclude: &HashSet<String>,
    ) -> Vec<Recommendation> {
        match self.scores_for_user(user_index) {
            Some(mut scores) => {
                mask_titles(&mut scores, self.game_titles, exclude);
                rank_scores(&scores, n, self.game_titles)
            }
            None => Vec::new(),
        }
    }
}

/// アイテム × アイテムのコサイン類似度を密行列として持つ版。
/// カタログが小さいときだけ使う。
pub struct PrecomputedItemCF<'a> {
    user_item: &'a SparseWeightMatrix,
    game_titles: &'a [String],
    /// (items, items)
    similarity: Tensor,
}

impl<'a> PrecomputedItemCF<'a> {
    pub fn new(
        user_item: &'a SparseWeightMatrix,
        game_titles: &'a [String],
        device: &Device,
    ) -> Result<Self> {
        let (n_users, n_items) = user_item.shape();
        let norms = user_item.item_norms();

        let mut dense = vec![0.0f32; n_items * n_users];
        for (u, i, w) in user_item.entries() {
            dense[i * n_users + u] = w / norms[i];
        }
        let norm_item = Tensor::from_vec(dense, (n_items, n_users), device)?;
        let similarity = norm_item.matmul(&norm_item.t()?.contiguous()?)?;
        debug!(items = n_items, "materialized item-item similarity");

        Ok(Self {
            user_item,
            game_titles,
            similarity,
        })
    }

    pub fn similarity(&self, i: usize, j: usize) -> Result<f32> {
        self.similarity
            .get(i)?
            .get(j)?
            .to_scalar::<f32>()
            .map_err(Into::into)
    }

    pub fn scores_for_user(&self, user_index: usize) -> Result<Option<Vec<f32>>> {
        let Some(profile) = self.user_item.row(user_index) else {
            warn!(user_index, "user index out of range");
            return Ok(None);
        };
        if profile.nnz() == 0 {
            return Ok(None);
        }

        let n_items = self.user_item.n_items();
        let mut dense = vec![0.0f32; n_items];
        for (i, &w) in profile.iter() {
            dense[i] = w;
        }
        let profile_t = Tensor::from_vec(dense, (1, n_items), self.similarity.device())?;
        let mut scores = profile_t.matmul(&self.similarity)?.squeeze(0)?.to_vec1::<f32>()?;

        for &i in profile.indices() {
            scores[i] = f32::NEG_INFINITY;
        }
        Ok(Some(scores))
    }

    pub fn recommend_for_user(&self, user_index: usize, n: usize) -> Result<Vec<Recommendation>> {
        self.recommend_excluding(user_index, n, &HashSet::new())
    }

    pub fn recommend_excluding(
        &self,
        user_index: usize,
        n: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Recommendation>> {
        Ok(match self.scores_for_user(user_index)? {
            Some(mut scores) => {
                mask_titles(&mut scores, self.game_titles, exclude);
                rank_scores(&scores, n, self.game_titles)
            }
            None => Vec::new(),
        })
    }
}

/// スコア上位 n 件のインデックスを降順で返す。
///
/// 同点はインデックスの小さい方を優先する。この全順序で分割と並べ替えの両方を行うので、
/// 境界で同点が並んでも結果は決定的になる。
pub fn top_k(scores: &[f32], n: usize) -> Vec<usize> {
    if n == 0 || scores.is_empty() {
        return Vec::new();
    }
    let by_rank = |a: &usize, b: &usize| scores[*b].total_cmp(&scores[*a]).then(a.cmp(b));

    let mut indices: Vec<usize> = (0..scores.len()).collect();
    let kth = n.min(scores.len() - 1);
    indices.select_nth_unstable_by(kth, by_rank);
    indices.truncate(n.min(scores.len()));
    indices.sort_by(by_rank);
    indices
}

/// game_titles は昇順なので二分探索でインデックスを引く。知らないタイトルは無視
fn mask_titles(scores: &mut [f32], game_titles: &[String], exclude: &HashSet<String>) {
    for title in exclude {
        if let Ok(i) = game_titles.binary_search_by(|t| t.as_str().cmp(title.as_str())) {
            scores[i] = f32::NEG_INFINITY;
        }
    }
}

fn rank_scores(scores: &[f32], n: usize, game_titles: &[String]) -> Vec<Recommendation> {
    top_k(scores, n)
        .into_iter()
        .filter(|&i| scores[i].is_finite())
        .map(|i| Recommendation {
            title: game_titles[i].clone(),
            score: scores[i],
        })
        .collect()
}
