//! Property-Based Tests for Entanglement Nodes
//!
//! Uses proptest to check invalidation and deletion over random key hierarchies.

use proptest::prelude::*;
use std::collections::BTreeSet;

use crate::key::is_nested_under;
use crate::node::EntanglementSync;

// == Test Configuration ==
const TEST_LIFESPAN_MS: u64 = 60_000;

// == Strategies ==
/// Generates hierarchical keys over segments that share prefixes ("p", "pq")
fn key_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["p", "q", "pq", "c", "d"]), 1..4)
        .prop_map(|segments| segments.join("/"))
}

fn key_set_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(key_strategy(), 1..12)
}

/// A source node holding a number per key and a node mirroring it.
fn mirrored_pair() -> (EntanglementSync<u32, u32>, EntanglementSync<u32>) {
    let source = EntanglementSync::builder(|_key, _deps, value: &u32| Ok(*value))
        .label("source")
        .lifespan(TEST_LIFESPAN_MS)
        .build()
        .unwrap();
    let mirror = EntanglementSync::builder(|_key, deps, _: &()| {
        Ok(*deps.get::<u32>("source")?.raw())
    })
    .label("mirror")
    .dependency("source", &source)
    .lifespan(TEST_LIFESPAN_MS)
    .build()
    .unwrap();
    (source, mirror)
}

fn seed(
    source: &EntanglementSync<u32, u32>,
    mirror: &EntanglementSync<u32>,
    keys: &BTreeSet<String>,
) {
    for key in keys {
        source.cache(key, 0).unwrap();
        mirror.cache(key, ()).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Caching a key and reading it back yields the same value, repeatedly.
    #[test]
    fn prop_roundtrip(key in key_strategy(), value in any::<u32>()) {
        let (source, _) = mirrored_pair();

        let cached = source.cache(&key, value).unwrap();
        prop_assert_eq!(*cached.raw(), value);
        prop_assert_eq!(*source.get(&key).unwrap().raw(), value);
        prop_assert_eq!(*source.get(&key).unwrap().raw(), value);
    }

    // Updating a key marks exactly the nested dependent keys dirty, and reading
    // them afterwards reflects the new upstream state.
    #[test]
    fn prop_update_marks_nested_keys_dirty(
        keys in key_set_strategy(),
        index in any::<prop::sample::Index>()
    ) {
        let (source, mirror) = mirrored_pair();
        seed(&source, &mirror, &keys);

        let updated = index.get(&keys.iter().collect::<Vec<_>>()).to_string();
        source.update(&updated, 1).unwrap();

        for key in &keys {
            prop_assert_eq!(
                mirror.is_dirty(key),
                is_nested_under(key, &updated),
                "dirty flag mismatch for {} after updating {}", key, updated
            );
        }

        for key in &keys {
            let expected = *source.get(key).unwrap().raw();
            prop_assert_eq!(*mirror.get(key).unwrap().raw(), expected);
            prop_assert!(!mirror.is_dirty(key));
        }
        prop_assert_eq!(*mirror.get(&updated).unwrap().raw(), 1);
    }

    // Deleting a key removes it from the node and every nested key from the
    // dependent node, leaving everything else in place.
    #[test]
    fn prop_delete_cascades_to_nested_keys(
        keys in key_set_strategy(),
        index in any::<prop::sample::Index>()
    ) {
        let (source, mirror) = mirrored_pair();
        seed(&source, &mirror, &keys);

        let deleted = index.get(&keys.iter().collect::<Vec<_>>()).to_string();
        source.delete(&deleted);

        for key in &keys {
            prop_assert_eq!(source.exists(key), *key != deleted);
            prop_assert_eq!(mirror.exists(key), !is_nested_under(key, &deleted));
        }
    }
}
