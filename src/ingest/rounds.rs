use std::collections::VecDeque;

/// Round-indexed interleaving over per-source entry lists.
///
/// Round `r` yields entry `r` of every lane that still has one, in lane
/// order. Iteration ends at the first round that yields nothing, so an
/// entry-rich lane can never push a short lane's entries behind its own
/// later ones.
#[derive(Debug)]
pub struct RoundRobin<K, T> {
    lanes: Vec<(K, VecDeque<T>)>,
    round: usize,
}

impl<K: Clone, T> RoundRobin<K, T> {
    pub fn new(lanes: impl IntoIterator<Item = (K, Vec<T>)>) -> Self {
        Self {
            lanes: lanes
                .into_iter()
                .map(|(key, items)| (key, VecDeque::from(items)))
                .collect(),
            round: 0,
        }
    }

    /// Index of the next round to be yielded
    pub fn round(&self) -> usize {
        self.round
    }

    /// Items still queued across all lanes
    pub fn remaining(&self) -> usize {
        self.lanes.iter().map(|(_, items)| items.len()).sum()
    }

    /// Take the next round, or `None` once every lane is exhausted.
    pub fn next_round(&mut self) -> Option<Vec<(K, T)>> {
        let batch: Vec<(K, T)> = self
            .lanes
            .iter_mut()
            .filter_map(|(key, items)| items.pop_front().map(|item| (key.clone(), item)))
            .collect();

        if batch.is_empty() {
            return None;
        }
        self.lanes.retain(|(_, items)| !items.is_empty());
        self.round += 1;
        Some(batch)
    }
}

impl<K: Clone, T> Iterator for RoundRobin<K, T> {
    type Item = Vec<(K, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_interleaves_one_per_lane_per_round() {
        let rr = RoundRobin::new([("a", vec![1, 2, 3]), ("b", vec![10]), ("c", vec![20, 21])]);
        let rounds: Vec<Vec<(&str, i32)>> = rr.collect();
        assert_eq!(
            rounds,
            vec![
                vec![("a", 1), ("b", 10), ("c", 20)],
                vec![("a", 2), ("c", 21)],
                vec![("a", 3)],
            ]
        );
    }

    #[test]
    fn test_empty_lanes_terminate_immediately() {
        let mut rr: RoundRobin<&str, i32> = RoundRobin::new([("a", vec![]), ("b", vec![])]);
        assert!(rr.next_round().is_none());
        assert_eq!(rr.round(), 0);
    }

    #[test]
    fn test_rich_source_cannot_starve_short_one() {
        let a: Vec<String> = (1..=50).map(|i| format!("A{i}")).collect();
        let b = vec!["B1".to_string(), "B2".to_string()];
        let order: Vec<String> = RoundRobin::new([("a", a), ("b", b)])
            .flatten()
            .map(|(_, item)| item)
            .collect();

        let pos = |name: &str| order.iter().position(|x| x == name).unwrap();
        assert!(pos("B2") < pos("A3"));
        assert!(pos("A2") < pos("A3"));
        assert_eq!(order.len(), 52);
    }

    proptest! {
        #[test]
        fn prop_every_item_yielded_once_in_lane_order(
            lens in proptest::collection::vec(0usize..20, 0..8)
        ) {
            let lanes: Vec<(usize, Vec<usize>)> =
                lens.iter().enumerate().map(|(k, n)| (k, (0..*n).collect())).collect();
            let max_len = lens.iter().copied().max().unwrap_or(0);
            let total: usize = lens.iter().sum();

            let mut rr = RoundRobin::new(lanes);
            prop_assert_eq!(rr.remaining(), total);

            let mut seen = 0;
            let mut rounds = 0;
            while let Some(batch) = rr.next_round() {
                // Round r carries item r of every lane long enough
                for (lane, item) in &batch {
                    prop_assert_eq!(*item, rounds);
                    prop_assert!(lens[*lane] > rounds);
                }
                let expected = lens.iter().filter(|n| **n > rounds).count();
                prop_assert_eq!(batch.len(), expected);
                seen += batch.len();
                rounds += 1;
            }
            prop_assert_eq!(seen, total);
            prop_assert_eq!(rounds, max_len);
        }
    }
}
