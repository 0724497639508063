use crate::datasets::Dataset;
use crate::error::Result;
use crate::types::WeightedInteraction;
use sprs::{CsMat, CsVecView, TriMat};
use tracing::debug;

/// ユーザー × ゲームの疎な重み行列 (CSR)。作成後は読み取り専用。
#[derive(Debug, Clone)]
pub struct SparseWeightMatrix {
    inner: CsMat<f32>,
}

impl SparseWeightMatrix {
    /// 同じ (row, col) に複数行が来た場合は合算する
    pub fn build(ds: &Dataset, interactions: &[WeightedInteraction]) -> Result<Self> {
        let shape = (ds.users.len(), ds.games.len());
        let mut triplets = TriMat::with_capacity(shape, interactions.len());
        for x in interactions {
            let row = ds.user_index(x.user_id)?;
            let col = ds.game_index(&x.game)?;
            triplets.add_triplet(row, col, x.weight);
        }
        let inner: CsMat<f32> = triplets.to_csr();
        debug!(rows = shape.0, cols = shape.1, nnz = inner.nnz(), "built user-item matrix");
        Ok(Self { inner })
    }

    /// (n_users, n_items)
    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    pub fn n_users(&self) -> usize {
        self.inner.rows()
    }

    pub fn n_items(&self) -> usize {
        self.inner.cols()
    }

    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    pub fn row(&self, user_index: usize) -> Option<CsVecView<'_, f32>> {
        self.inner.outer_view(user_index)
    }

    pub fn get(&self, user_index: usize, item_index: usize) -> f32 {
        self.inner.get(user_index, item_index).copied().unwrap_or(0.0)
    }

    /// ユーザーが触ったアイテムのインデックス (昇順)
    pub fn owned_items(&self, user_index: usize) -> Vec<usize> {
        self.row(user_index)
            .map(|row| row.indices().to_vec())
            .unwrap_or_default()
    }

    /// (user, item, weight) を行順に列挙する
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.inner.iter().map(|(&w, (u, i))| (u, i, w))
    }

    /// 各アイテム列 (ユーザー方向) のL2ノルム
    pub fn item_norms(&self) -> Vec<f32> {
        let mut sq = vec![0.0f32; self.n_items()];
        for (_, i, w) in self.entries() {
            sq[i] += w * w;
        }
        sq.into_iter().map(f32::sqrt).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interactions() -> Vec<WeightedInteraction> {
        vec![
            WeightedInteraction::new(1, "A", 3.0),
            WeightedInteraction::new(1, "B", 1.0),
            WeightedInteraction::new(2, "A", 2.0),
            WeightedInteraction::new(2, "B", 2.0),
            WeightedInteraction::new(2, "C", 1.0),
        ]
    }

    #[test]
    fn test_build_matrix() -> Result<()> {
        let data = interactions();
        let ds = Dataset::index(&data);
        let m = SparseWeightMatrix::build(&ds, &data)?;

        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.nnz(), 5);
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(0, 2), 0.0);
        assert_eq!(m.get(1, 2), 1.0);
        assert_eq!(m.owned_items(0), vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_entries_in_row_order() -> Result<()> {
        let data = interactions();
        let ds = Dataset::index(&data);
        let m = SparseWeightMatrix::build(&ds, &data)?;

        let entries: Vec<(usize, usize, f32)> = m.entries().collect();
        assert_eq!(
            entries,
            vec![(0, 0, 3.0), (0, 1, 1.0), (1, 0, 2.0), (1, 1, 2.0), (1, 2, 1.0)]
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_rows_are_summed() -> Result<()> {
        let mut data = interactions();
        data.push(WeightedInteraction::new(1, "A", 0.5));
        let ds = Dataset::index(&data);
        let m = SparseWeightMatrix::build(&ds, &data)?;

        assert_eq!(m.nnz(), 5);
        assert_eq!(m.get(0, 0), 3.5);
        Ok(())
    }

    #[test]
    fn test_unindexed_interaction_is_rejected() {
        let data = interactions();
        let ds = Dataset::index(&data[..2]);
        assert!(SparseWeightMatrix::build(&ds, &data).is_err());
    }

    #[test]
    fn test_item_norms() -> Result<()> {
        let data = interactions();
        let ds = Dataset::index(&data);
        let m = SparseWeightMatrix::build(&ds, &data)?;

        let norms = m.item_norms();
        assert!((norms[0] - 13f32.sqrt()).abs() < 1e-6);
        assert!((norms[1] - 5f32.sqrt()).abs() < 1e-6);
        assert!((norms[2] - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_empty_matrix() -> Result<()> {
        let ds = Dataset::index(&[]);
        let m = SparseWeightMatrix::build(&ds, &[])?;
        assert_eq!(m.shape(), (0, 0));
        assert!(m.row(0).is_none());
        assert!(m.owned_items(0).is_empty());
        Ok(())
    }
}
