//! Integration tests for prediction-context merging and interning.

use atnlex::context::{
    get_cached_context, merge, MergeCache, PredictionContext, SharedContextCache,
    VisitedContexts, EMPTY_RETURN_STATE,
};
use std::sync::Arc;

fn chain(returns: &[u32]) -> Arc<PredictionContext> {
    let mut ctx = PredictionContext::empty();
    for rs in returns {
        ctx = PredictionContext::singleton(Some(ctx), *rs);
    }
    ctx
}

fn intern(ctx: &Arc<PredictionContext>, cache: &SharedContextCache) -> Arc<PredictionContext> {
    let mut visited = VisitedContexts::default();
    get_cached_context(ctx, cache, &mut visited)
}

#[test]
fn test_merge_idempotent() {
    let mut cache = MergeCache::default();
    for returns in [&[][..], &[4][..], &[4, 9][..]] {
        let a = chain(returns);
        let b = chain(returns);
        let merged = merge(&a, &b, true, &mut cache);
        assert!(Arc::ptr_eq(&merged, &a), "merge(a, a) must be a for {returns:?}");
    }
}

#[test]
fn test_merge_commutative_structurally() {
    let shapes: Vec<Arc<PredictionContext>> = vec![
        PredictionContext::empty(),
        chain(&[2]),
        chain(&[9]),
        chain(&[2, 5]),
        chain(&[9, 5]),
        chain(&[1, 2, 3]),
    ];
    for wildcard in [true, false] {
        for a in &shapes {
            for b in &shapes {
                let mut cache = MergeCache::default();
                let ab = merge(a, b, wildcard, &mut cache);
                let mut cache = MergeCache::default();
                let ba = merge(b, a, wildcard, &mut cache);
                assert_eq!(ab, ba, "merge must commute (wildcard: {wildcard})");
            }
        }
    }
}

#[test]
fn test_merge_preserves_both_stacks() {
    let mut cache = MergeCache::default();
    let a = chain(&[7, 3]);
    let b = chain(&[8, 3]);
    let merged = merge(&a, &b, true, &mut cache);
    // Same top frame, forked parents.
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.return_state(0), 3);
    let parent = merged.parent(0).expect("parent");
    assert_eq!(parent.len(), 2);
    assert_eq!(parent.return_state(0), 7);
    assert_eq!(parent.return_state(1), 8);
    assert!(parent
        .parent(0)
        .expect("grandparent")
        .is_empty());
}

#[test]
fn test_full_context_merge_keeps_empty_branch() {
    let mut cache = MergeCache::default();
    let a = chain(&[6]);
    let empty = PredictionContext::empty();
    let merged = merge(&a, &empty, false, &mut cache);
    assert!(merged.has_empty_path());
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.return_state(1), EMPTY_RETURN_STATE);
    assert!(merged.parent(1).is_none());

    // The same merge under the wildcard root collapses to empty.
    let mut cache = MergeCache::default();
    assert!(merge(&a, &empty, true, &mut cache).is_empty());
}

#[test]
fn test_array_merge_coalesces_shared_returns() {
    let mut cache = MergeCache::default();
    let left = merge(&chain(&[1]), &chain(&[5]), true, &mut cache);
    let right = merge(&chain(&[3]), &chain(&[5]), true, &mut cache);
    let merged = merge(&left, &right, true, &mut cache);
    let states: Vec<u32> = (0..merged.len()).map(|i| merged.return_state(i)).collect();
    assert_eq!(states, vec![1, 3, 5]);
}

#[test]
fn test_interning_makes_equality_physical() {
    let cache = SharedContextCache::new();
    let shapes = [chain(&[3]), chain(&[3, 8]), chain(&[4, 8])];
    for a in &shapes {
        for b in &shapes {
            let ia = intern(a, &cache);
            let ib = intern(b, &cache);
            assert_eq!(a == b, Arc::ptr_eq(&ia, &ib));
        }
    }
}

#[test]
fn test_interning_shares_subgraphs() {
    let cache = SharedContextCache::new();
    let first = intern(&chain(&[2, 6]), &cache);
    let second = intern(&chain(&[2, 9]), &cache);
    // Distinct tops, but the `[2]` parent is one node.
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(
        first.parent(0).expect("parent"),
        second.parent(0).expect("parent")
    ));
}

#[test]
fn test_merged_results_intern_cleanly() {
    let cache = SharedContextCache::new();
    let mut merge_cache = MergeCache::default();
    let merged = merge(&chain(&[4, 2]), &chain(&[9, 2]), true, &mut merge_cache);
    let canonical = intern(&merged, &cache);
    assert_eq!(*canonical, *merged);
    // Re-interning an equal graph returns the same physical node.
    let again = intern(&merge(&chain(&[4, 2]), &chain(&[9, 2]), true, &mut merge_cache), &cache);
    assert!(Arc::ptr_eq(&canonical, &again));
}
