//! Exact top-K selection

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::SearchHit;
use crate::item::ItemId;
use crate::metric::DistanceMetric;

/// Candidate ordered by distance, then id
struct Ranked<'a> {
    distance: f32,
    id: &'a ItemId,
}

impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(other.id))
    }
}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

/// Select the `k` entries closest to `query`
///
/// Keeps a bounded max-heap so memory stays at `k` regardless of store size.
/// The result is ascending by distance with ties broken by ascending id; NaN
/// distances sort last.
pub fn top_k<'a, I>(entries: I, query: &[f32], metric: DistanceMetric, k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'a ItemId, &'a [f32])>,
{
    if k == 0 {
        return vec![];
    }

    let mut heap: BinaryHeap<Ranked<'a>> = BinaryHeap::with_capacity(k + 1);
    for (id, vector) in entries {
        let mut distance = metric.distance(query, vector);
        if distance.is_nan() {
            distance = f32::INFINITY;
        }
        let candidate = Ranked { distance, id };

        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|r| SearchHit {
            id: r.id.clone(),
            distance: r.distance,
        })
        .collect()
}
