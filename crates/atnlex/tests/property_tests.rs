//! Property-based tests for the algebraic laws the runtime relies on.

use atnlex::action::{LexerAction, LexerActionExecutor};
use atnlex::context::{merge, MergeCache, PredictionContext};
use atnlex::interval::IntervalSet;
use proptest::prelude::*;
use std::sync::Arc;

fn interval_ops() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((0..300i32, 0..40i32).prop_map(|(lo, len)| (lo, lo + len)), 0..24)
}

proptest! {
    #[test]
    fn prop_interval_set_invariants(ops in interval_ops()) {
        let mut set = IntervalSet::new();
        for &(lo, hi) in &ops {
            set.add_range(lo, hi);
        }
        let intervals: Vec<_> = set.iter().collect();
        for iv in &intervals {
            prop_assert!(iv.lo < iv.hi, "empty interval {iv:?}");
        }
        for pair in intervals.windows(2) {
            // Sorted, disjoint, and never merely adjacent.
            prop_assert!(pair[0].hi < pair[1].lo);
        }
    }

    #[test]
    fn prop_interval_set_matches_naive_membership(ops in interval_ops(), probe in 0..400i32) {
        let mut set = IntervalSet::new();
        for &(lo, hi) in &ops {
            set.add_range(lo, hi);
        }
        let naive = ops.iter().any(|&(lo, hi)| lo <= probe && probe < hi);
        prop_assert_eq!(set.contains(probe), naive);
    }

    #[test]
    fn prop_interval_add_commutative(ops in interval_ops(), seed in any::<u64>()) {
        let mut forward = IntervalSet::new();
        for &(lo, hi) in &ops {
            forward.add_range(lo, hi);
        }
        let mut shuffled = ops.clone();
        // Cheap deterministic shuffle.
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state % (i as u64 + 1)) as usize);
        }
        let mut backward = IntervalSet::new();
        for &(lo, hi) in &shuffled {
            backward.add_range(lo, hi);
        }
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn prop_interval_add_idempotent(ops in interval_ops()) {
        let mut set = IntervalSet::new();
        for &(lo, hi) in &ops {
            set.add_range(lo, hi);
        }
        let snapshot = set.clone();
        for &(lo, hi) in &ops {
            set.add_range(lo, hi);
        }
        prop_assert_eq!(set, snapshot);
    }

    #[test]
    fn prop_complement_is_involutive(ops in interval_ops()) {
        let mut set = IntervalSet::new();
        for &(lo, hi) in &ops {
            set.add_range(lo, hi);
        }
        let double = set.complement(0, 400).complement(0, 400);
        for probe in 0..400 {
            prop_assert_eq!(double.contains(probe), set.contains(probe));
        }
    }
}

fn context_strategy() -> impl Strategy<Value = Arc<PredictionContext>> {
    // Chains of small return states, merged pairwise to produce array nodes.
    let chain = prop::collection::vec(1u32..12, 0..4).prop_map(|returns| {
        let mut ctx = PredictionContext::empty();
        for rs in returns {
            ctx = PredictionContext::singleton(Some(ctx), rs);
        }
        ctx
    });
    prop::collection::vec(chain, 1..4).prop_map(|chains| {
        let mut cache = MergeCache::default();
        let mut result = chains[0].clone();
        for ctx in &chains[1..] {
            result = merge(&result, ctx, true, &mut cache);
        }
        result
    })
}

proptest! {
    #[test]
    fn prop_merge_idempotent(ctx in context_strategy()) {
        let mut cache = MergeCache::default();
        let merged = merge(&ctx, &ctx, true, &mut cache);
        prop_assert!(Arc::ptr_eq(&merged, &ctx));
    }

    #[test]
    fn prop_merge_commutative(a in context_strategy(), b in context_strategy(), wildcard in any::<bool>()) {
        let mut cache = MergeCache::default();
        let ab = merge(&a, &b, wildcard, &mut cache);
        let mut cache = MergeCache::default();
        let ba = merge(&b, &a, wildcard, &mut cache);
        prop_assert_eq!(&*ab, &*ba);
    }

    #[test]
    fn prop_merge_absorbs_operands(a in context_strategy(), b in context_strategy()) {
        // Merging the merge with either operand changes nothing.
        let mut cache = MergeCache::default();
        let ab = merge(&a, &b, true, &mut cache);
        let with_a = merge(&ab, &a, true, &mut cache);
        let with_b = merge(&ab, &b, true, &mut cache);
        prop_assert_eq!(&*with_a, &*ab);
        prop_assert_eq!(&*with_b, &*ab);
    }
}

fn action_strategy() -> impl Strategy<Value = LexerAction> {
    prop_oneof![
        Just(LexerAction::Skip),
        Just(LexerAction::More),
        Just(LexerAction::PopMode),
        (0u32..4).prop_map(LexerAction::Channel),
        (0usize..4).prop_map(LexerAction::Mode),
        (0usize..4).prop_map(LexerAction::PushMode),
        (1i32..8).prop_map(LexerAction::Type),
        (0usize..4, 0usize..4).prop_map(|(rule_index, action_index)| LexerAction::Custom {
            rule_index,
            action_index
        }),
    ]
}

proptest! {
    #[test]
    fn prop_executor_append_law(actions in prop::collection::vec(action_strategy(), 0..6), last in action_strategy()) {
        let previous = actions.iter().fold(None, |acc: Option<Arc<LexerActionExecutor>>, action| {
            Some(LexerActionExecutor::append(acc.as_ref(), action.clone()))
        });
        let appended = LexerActionExecutor::append(previous.as_ref(), last.clone());

        let mut expected = actions.clone();
        expected.push(last);
        prop_assert_eq!(appended.actions(), expected.as_slice());
        if let Some(previous) = previous {
            prop_assert_eq!(previous.actions(), &actions[..]);
        }
    }

    #[test]
    fn prop_fix_offset_stable(actions in prop::collection::vec(action_strategy(), 1..6), offset in 0usize..32) {
        let executor = actions.iter().fold(None, |acc: Option<Arc<LexerActionExecutor>>, action| {
            Some(LexerActionExecutor::append(acc.as_ref(), action.clone()))
        }).expect("non-empty");
        let fixed = LexerActionExecutor::fix_offset_before_match(&executor, offset);
        // A second fix is the identity: offsets freeze exactly once.
        let refixed = LexerActionExecutor::fix_offset_before_match(&fixed, offset + 1);
        prop_assert!(Arc::ptr_eq(&fixed, &refixed));
        prop_assert_eq!(fixed.actions().len(), executor.actions().len());
    }
}
