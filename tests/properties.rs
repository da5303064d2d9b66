//! Property tests for pairing enumeration and aggregation.

use proptest::prelude::*;
use tower_agora::{aggregate, pairings, Pairing, RatingMatrix, RatingRecord};

fn record() -> impl Strategy<Value = RatingRecord> {
    (prop::array::uniform6(1u8..=5), "[a-z ]{0,12}").prop_map(|(s, rationale)| RatingRecord {
        collaboration: s[0],
        handoff_clarity: s[1],
        reliability: s[2],
        communication: s[3],
        initiative: s[4],
        overall: s[5],
        rationale,
    })
}

proptest! {
    #[test]
    fn pairings_cover_every_ordered_pair(n in 2usize..8) {
        let names: Vec<String> = (0..n).map(|i| format!("Agent_{}", i + 1)).collect();
        let units = pairings(names.iter().map(String::as_str));
        prop_assert_eq!(units.len(), n * (n - 1));
        prop_assert!(units.iter().all(|p| p.evaluator != p.subject));

        let matrix = RatingMatrix::from_cells(units.into_iter().map(|p: Pairing| {
            let r = RatingRecord {
                collaboration: 3, handoff_clarity: 3, reliability: 3,
                communication: 3, initiative: 3, overall: 3,
                rationale: String::new(),
            };
            (p, r)
        })).unwrap();
        prop_assert!(matrix.is_complete(names.iter().map(String::as_str)));
    }

    #[test]
    fn aggregate_ignores_order(records in prop::collection::vec(record(), 0..20), seed in any::<u64>()) {
        let mut shuffled = records.clone();
        // deterministic rotation + reversal stands in for a shuffle
        if !shuffled.is_empty() {
            let k = (seed as usize) % shuffled.len();
            shuffled.rotate_left(k);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
        }
        prop_assert_eq!(aggregate(&records), aggregate(&shuffled));
    }

    #[test]
    fn aggregate_stays_in_range(records in prop::collection::vec(record(), 1..20)) {
        let score = aggregate(&records);
        for v in score.to_map().values() {
            prop_assert!((1.0..=5.0).contains(v));
        }
    }
}
