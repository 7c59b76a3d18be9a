//! HNSW candidate index for large stores
//!
//! Only used to narrow the candidate set; final ordering is always recomputed
//! exactly by [`top_k`](super::top_k).

use instant_distance::{Builder, HnswMap, Point, Search};

use crate::item::ItemId;
use crate::metric::DistanceMetric;

/// Candidates the graph can return per query
pub(crate) const EF_SEARCH: usize = 256;

/// Fixed so rebuilding the graph over the same entries yields the same graph
const BUILD_SEED: u64 = 0x5EED_1E45;

/// HNSW point wrapper carrying the store metric
#[derive(Clone)]
struct EntryPoint {
    vector: Vec<f32>,
    metric: DistanceMetric,
}

impl Point for EntryPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.metric.distance(&self.vector, &other.vector)
    }
}

/// HNSW index wrapper
pub(crate) struct HnswIndex {
    map: HnswMap<EntryPoint, ItemId>,
    metric: DistanceMetric,
}

impl HnswIndex {
    pub(crate) fn build<'a, I>(entries: I, metric: DistanceMetric) -> Self
    where
        I: IntoIterator<Item = (&'a ItemId, &'a [f32])>,
    {
        let (points, ids): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .map(|(id, vector)| {
                (
                    EntryPoint {
                        vector: vector.to_vec(),
                        metric,
                    },
                    id.clone(),
                )
            })
            .unzip();

        log::debug!("Building HNSW graph over {} entries", ids.len());

        let map = Builder::default()
            .ef_construction(100)
            .ef_search(EF_SEARCH)
            .seed(BUILD_SEED)
            .build(points, ids);

        Self { map, metric }
    }

    /// Up to `limit` approximate nearest ids
    pub(crate) fn candidates(&self, query: &[f32], limit: usize) -> Vec<ItemId> {
        let query_point = EntryPoint {
            vector: query.to_vec(),
            metric: self.metric,
        };

        let mut search = Search::default();
        self.map
            .search(&query_point, &mut search)
            .take(limit)
            .map(|item| item.value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_contain_exact_match() {
        let ids: Vec<ItemId> = (0..50).map(|i| ItemId::new(format!("{i:03}.jpg"))).collect();
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                let angle = i as f32 * 0.1;
                vec![angle.cos(), angle.sin()]
            })
            .collect();

        let index = HnswIndex::build(
            ids.iter().zip(vectors.iter().map(Vec::as_slice)),
            DistanceMetric::Cosine,
        );

        let found = index.candidates(&vectors[17], 5);
        assert!(!found.is_empty());
        assert!(found.len() <= 5);
        assert!(found.contains(&ids[17]));
    }
}
