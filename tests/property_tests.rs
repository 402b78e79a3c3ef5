//! Property-based tests for customers-choice
//!
//! - Selection invariants over arbitrary spreadings
//! - Stickiness and merge laws of the engine
//! - Run with ProptestConfig::with_cases(100)

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use customers_choice::config::parse_document;
use customers_choice::logger::NoLogger;
use customers_choice::selector::{select, WeightedSelector};
use customers_choice::{CustomersChoice, Variant, UNASSIGNED};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Spreading with at least one positive weight
fn arb_spreading() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(1u32..1_000, 1..12)
}

/// Spreading that may contain zero weights, but not only zeros
fn arb_sparse_spreading() -> impl Strategy<Value = Vec<u32>> {
    (proptest::collection::vec(prop_oneof![Just(0u32), 1u32..50], 1..12), any::<prop::sample::Index>())
        .prop_map(|(mut weights, index)| {
            let i = index.index(weights.len());
            weights[i] = weights[i].max(1);
            weights
        })
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Selection Properties
    // ========================================================================

    /// Property: selected bucket is always within 1..=len
    #[test]
    fn prop_bucket_in_range(spreading in arb_spreading(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let bucket = select(&spreading, &mut rng).unwrap();
        prop_assert!(bucket >= 1);
        prop_assert!(bucket as usize <= spreading.len());
    }

    /// Property: zero-weight buckets are never chosen
    #[test]
    fn prop_zero_weight_never_chosen(spreading in arb_sparse_spreading(), seed in any::<u64>()) {
        let mut selector = WeightedSelector::seeded(seed);
        for _ in 0..20 {
            let bucket = selector.select(&spreading).unwrap();
            prop_assert!(spreading[bucket as usize - 1] > 0, "picked empty bucket {}", bucket);
        }
    }

    /// Property: same seed, same sequence
    #[test]
    fn prop_seeded_selection_reproducible(spreading in arb_spreading(), seed in any::<u64>()) {
        let mut a = WeightedSelector::seeded(seed);
        let mut b = WeightedSelector::seeded(seed);
        for _ in 0..10 {
            prop_assert_eq!(a.select(&spreading).unwrap(), b.select(&spreading).unwrap());
        }
    }

    /// Property: all-zero spreadings are rejected
    #[test]
    fn prop_all_zero_rejected(len in 1usize..10, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        prop_assert!(select(&vec![0; len], &mut rng).is_err());
    }

    // ========================================================================
    // Variant Properties
    // ========================================================================

    /// Property: window check is strict on both ends
    #[test]
    fn prop_window_exclusive(start in -1_000i64..1_000, width in 0i64..1_000, probe in -2_000i64..3_000) {
        let end = start + width;
        let variant = Variant::new("w", start, end, vec![1]).unwrap();
        prop_assert_eq!(variant.is_active_at(probe), start < probe && probe < end);
    }

    /// Property: a valid entry parses into an identical variant
    #[test]
    fn prop_parsed_entry_matches(name in arb_name(), spreading in arb_spreading(), start in 0i64..1_000_000) {
        let document = serde_json::json!({
            "variants": [{ "name": name, "startTime": start, "spreading": spreading }]
        });
        let update = parse_document(&document.to_string(), &NoLogger).unwrap();

        prop_assert_eq!(update.entries.len(), 1);
        let variant = &update.entries[0].variant;
        prop_assert_eq!(variant.name(), name.as_str());
        prop_assert_eq!(variant.start(), start);
        prop_assert_eq!(variant.spreading(), spreading.as_slice());
        prop_assert_eq!(variant.current_variant(), UNASSIGNED);
    }

    // ========================================================================
    // Engine Properties
    // ========================================================================

    /// Property: once assigned, repeated calls return the same bucket
    #[test]
    fn prop_assignment_sticky(spreading in arb_spreading(), seed in any::<u64>(), calls in 2usize..20) {
        let rt = runtime();
        let engine = rt.block_on(async { CustomersChoice::builder().seed(seed).build().unwrap() });
        engine.add_variant(Variant::builder("s").spreading(spreading.clone()).build().unwrap(), true);

        let first = engine.get_variant("s");
        prop_assert!(first >= 1 && first as usize <= spreading.len());
        for _ in 1..calls {
            prop_assert_eq!(engine.get_variant("s"), first);
        }
    }

    /// Property: re-adding with preserve keeps the bucket, without resets it
    #[test]
    fn prop_preserve_law(spreading in arb_spreading(), seed in any::<u64>()) {
        let rt = runtime();
        let engine = rt.block_on(async { CustomersChoice::builder().seed(seed).build().unwrap() });
        let variant = Variant::builder("p").spreading(spreading).build().unwrap();

        engine.add_variant(variant.clone(), true);
        let bucket = engine.get_variant("p");

        engine.add_variant(variant.clone(), true);
        prop_assert_eq!(engine.variant("p").unwrap().current_variant(), bucket);

        engine.add_variant(variant, false);
        prop_assert_eq!(engine.variant("p").unwrap().current_variant(), UNASSIGNED);
    }
}
