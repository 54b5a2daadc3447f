//! Property tests for the ring/index invariants quantified in spec §8:
//! the store never exceeds its cap, eviction is strict insertion order
//! (never timestamp order), and the per-tab index always agrees with a
//! full unfiltered scan.

use proptest::prelude::*;

use super::BoundedOrderedStore;
use crate::filter::CompiledLogFilter;
use crate::model::{LogEntry, LogLevel};

type TestStore = BoundedOrderedStore<LogEntry, CompiledLogFilter>;

fn log(id: usize, tab_id: i64, ts: i64) -> LogEntry {
    LogEntry {
        id: id.to_string(),
        timestamp: ts,
        level: LogLevel::Info,
        message: "m".into(),
        args: vec![],
        stack: None,
        tab_id,
        url: "http://x/".into(),
        session_id: "S".into(),
    }
}

fn entries() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((0i64..4, 0i64..1_000_000), 0..200)
}

proptest! {
    #[test]
    fn never_exceeds_capacity(cap in 1usize..20, inserts in entries()) {
        let store = TestStore::new(cap, None);
        for (i, (tab_id, ts)) in inserts.iter().enumerate() {
            store.add(log(i, *tab_id, *ts));
        }
        prop_assert!(store.get_all(None).len() <= cap);
        prop_assert!(store.stats().total <= cap);
    }

    #[test]
    fn eviction_is_insertion_order_not_timestamp_order(cap in 1usize..20, inserts in entries()) {
        let store = TestStore::new(cap, None);
        for (i, (tab_id, ts)) in inserts.iter().enumerate() {
            store.add(log(i, *tab_id, *ts));
        }
        let remaining = store.get_all(None);
        if inserts.len() > cap {
            let expected_first_id = (inserts.len() - cap).to_string();
            prop_assert_eq!(&remaining[0].id, &expected_first_id);
        }
        // Remaining ids must be a suffix of 0..inserts.len() in order.
        let ids: Vec<usize> = remaining.iter().map(|e| e.id.parse().unwrap()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(ids, sorted);
    }

    #[test]
    fn per_tab_index_matches_unfiltered_scan(inserts in entries()) {
        let store = TestStore::new(10_000, None);
        for (i, (tab_id, ts)) in inserts.iter().enumerate() {
            store.add(log(i, *tab_id, *ts));
        }
        let all = store.get_all(None);
        let stats = store.stats();
        let total_per_tab: usize = stats.per_tab.values().sum();
        prop_assert_eq!(total_per_tab, all.len());

        for tab_id in 0i64..4 {
            let expected: Vec<String> = all
                .iter()
                .filter(|e| e.tab_id == tab_id)
                .map(|e| e.id.clone())
                .collect();
            let filter = CompiledLogFilter::compile(
                &crate::filter::LogFilterDescriptor {
                    tab_id: Some(tab_id),
                    ..Default::default()
                },
                0,
            );
            let via_index: Vec<String> = store
                .get_all(Some(&filter))
                .into_iter()
                .map(|e| e.id)
                .collect();
            prop_assert_eq!(via_index, expected);
        }
    }

    #[test]
    fn clear_none_always_empties(inserts in entries()) {
        let store = TestStore::new(10_000, None);
        for (i, (tab_id, ts)) in inserts.iter().enumerate() {
            store.add(log(i, *tab_id, *ts));
        }
        store.clear(None);
        prop_assert!(store.get_all(None).is_empty());
        prop_assert_eq!(store.stats().total, 0);
    }
}
