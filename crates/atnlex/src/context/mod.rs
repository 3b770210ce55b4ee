//! # Prediction Contexts
//!
//! The graph-structured stack of rule-call frames used during closure.
//!
//! ## Overview
//!
//! A [`PredictionContext`] is a persistent, immutable DAG node describing
//! the set of call stacks under which the simulator reached an ATN state.
//! Nodes share structure through `Arc` parents, the way the teacher-style
//! shared-prefix stacks share their tails, and every node caches a
//! structural hash at construction so set membership and interning are
//! cheap.
//!
//! Three shapes exist:
//!
//! - `Empty`: the sentinel root, reported as a single frame carrying
//!   [`EMPTY_RETURN_STATE`],
//! - `Singleton`: one `(parent, return_state)` frame,
//! - `Array`: several frames sorted by return state ascending, with the
//!   empty sentinel always last.
//!
//! [`merge`] combines two contexts that reach the same state into their
//! graph-theoretic union; results are interned per call site in a
//! [`MergeCache`] keyed on operand identity so repeated merges are O(1).
//! A [`SharedContextCache`] deduplicates whole subgraphs across the
//! lifetime of a grammar so DFA states reference one canonical copy of
//! every stack.

use hashbrown::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

/// Return-state sentinel marking the root of a stack.
pub const EMPTY_RETURN_STATE: u32 = 0x7FFF_FFFF;

#[derive(Debug)]
enum ContextKind {
    Empty,
    Singleton {
        parent: Option<Arc<PredictionContext>>,
        return_state: u32,
    },
    Array {
        parents: Vec<Option<Arc<PredictionContext>>>,
        return_states: Vec<u32>,
    },
}

/// An immutable stack-graph node. See the module docs.
#[derive(Debug)]
pub struct PredictionContext {
    /// Pure function of the structural contents, computed at construction.
    hash: u64,
    kind: ContextKind,
}

/// Per-call-site merge memo, keyed on the operand pair's identities. May be
/// cleared between `match` calls; entries never influence correctness, only
/// cost.
pub type MergeCache =
    HashMap<(usize, usize), Arc<PredictionContext>, ahash::RandomState>;

fn hash_frames(parents: &[Option<Arc<PredictionContext>>], return_states: &[u32]) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    hasher.write_usize(parents.len());
    for parent in parents {
        match parent {
            Some(p) => hasher.write_u64(p.hash),
            None => hasher.write_u64(0),
        }
    }
    for rs in return_states {
        hasher.write_u32(*rs);
    }
    hasher.finish()
}

impl PredictionContext {
    /// The shared empty-stack sentinel.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        static EMPTY: OnceLock<Arc<PredictionContext>> = OnceLock::new();
        EMPTY
            .get_or_init(|| {
                Arc::new(PredictionContext {
                    hash: hash_frames(&[], &[]),
                    kind: ContextKind::Empty,
                })
            })
            .clone()
    }

    /// Create a one-frame context. `(None, EMPTY_RETURN_STATE)` folds to the
    /// empty sentinel.
    #[must_use]
    pub fn singleton(parent: Option<Arc<Self>>, return_state: u32) -> Arc<Self> {
        if return_state == EMPTY_RETURN_STATE && parent.is_none() {
            return Self::empty();
        }
        let hash = hash_frames(std::slice::from_ref(&parent), &[return_state]);
        Arc::new(Self {
            hash,
            kind: ContextKind::Singleton { parent, return_state },
        })
    }

    fn array(parents: Vec<Option<Arc<Self>>>, return_states: Vec<u32>) -> Arc<Self> {
        debug_assert_eq!(parents.len(), return_states.len());
        debug_assert!(return_states.windows(2).all(|w| w[0] < w[1]));
        let hash = hash_frames(&parents, &return_states);
        Arc::new(Self {
            hash,
            kind: ContextKind::Array { parents, return_states },
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, ContextKind::Empty)
    }

    /// Whether any path through this context reaches the empty root directly.
    #[must_use]
    pub fn has_empty_path(&self) -> bool {
        self.return_state(self.len() - 1) == EMPTY_RETURN_STATE
    }

    /// Number of `(parent, return_state)` frames. The empty sentinel reports
    /// one frame carrying [`EMPTY_RETURN_STATE`].
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.kind {
            ContextKind::Empty | ContextKind::Singleton { .. } => 1,
            ContextKind::Array { return_states, .. } => return_states.len(),
        }
    }

    #[must_use]
    pub fn return_state(&self, index: usize) -> u32 {
        match &self.kind {
            ContextKind::Empty => EMPTY_RETURN_STATE,
            ContextKind::Singleton { return_state, .. } => {
                debug_assert_eq!(index, 0);
                *return_state
            }
            ContextKind::Array { return_states, .. } => return_states[index],
        }
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<&Arc<Self>> {
        match &self.kind {
            ContextKind::Empty => None,
            ContextKind::Singleton { parent, .. } => {
                debug_assert_eq!(index, 0);
                parent.as_ref()
            }
            ContextKind::Array { parents, .. } => parents[index].as_ref(),
        }
    }

    /// `(parent, return_state)` view when this node holds exactly one frame.
    fn as_single_frame(&self) -> Option<(Option<&Arc<Self>>, u32)> {
        match &self.kind {
            ContextKind::Empty => Some((None, EMPTY_RETURN_STATE)),
            ContextKind::Singleton { parent, return_state } => {
                Some((parent.as_ref(), *return_state))
            }
            ContextKind::Array { .. } => None,
        }
    }

    fn frames(&self) -> (Vec<Option<Arc<Self>>>, Vec<u32>) {
        match &self.kind {
            ContextKind::Empty => (vec![None], vec![EMPTY_RETURN_STATE]),
            ContextKind::Singleton { parent, return_state } => {
                (vec![parent.clone()], vec![*return_state])
            }
            ContextKind::Array { parents, return_states } => {
                (parents.clone(), return_states.clone())
            }
        }
    }
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.hash != other.hash {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ContextKind::Empty, ContextKind::Empty) => true,
            (
                ContextKind::Singleton { parent: pa, return_state: ra },
                ContextKind::Singleton { parent: pb, return_state: rb },
            ) => ra == rb && parent_eq(pa, pb),
            (
                ContextKind::Array { parents: pa, return_states: ra },
                ContextKind::Array { parents: pb, return_states: rb },
            ) => {
                ra == rb
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(x, y)| parent_eq(x, y))
            }
            _ => false,
        }
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

fn parent_eq(
    a: &Option<Arc<PredictionContext>>,
    b: &Option<Arc<PredictionContext>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Arc::ptr_eq(x, y) || x == y,
        _ => false,
    }
}

fn cache_key(a: &Arc<PredictionContext>, b: &Arc<PredictionContext>) -> (usize, usize) {
    (Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize)
}

/// Merge two contexts representing two ways of reaching the same ATN state.
///
/// With `root_is_wildcard` (the lexer/SLL mode), an empty operand absorbs
/// the other side; otherwise the empty root is preserved as a distinguished
/// sentinel frame in the result. Structurally equal operands return the
/// left side unchanged.
pub fn merge(
    a: &Arc<PredictionContext>,
    b: &Arc<PredictionContext>,
    root_is_wildcard: bool,
    cache: &mut MergeCache,
) -> Arc<PredictionContext> {
    if Arc::ptr_eq(a, b) || a == b {
        return a.clone();
    }
    if a.as_single_frame().is_some() && b.as_single_frame().is_some() {
        return merge_single_frames(a, b, root_is_wildcard, cache);
    }
    if root_is_wildcard {
        if a.is_empty() {
            return a.clone();
        }
        if b.is_empty() {
            return b.clone();
        }
    }
    merge_arrays(a, b, root_is_wildcard, cache)
}

fn merge_single_frames(
    a: &Arc<PredictionContext>,
    b: &Arc<PredictionContext>,
    root_is_wildcard: bool,
    cache: &mut MergeCache,
) -> Arc<PredictionContext> {
    if let Some(previous) = cache.get(&cache_key(a, b)) {
        return previous.clone();
    }
    if let Some(previous) = cache.get(&cache_key(b, a)) {
        return previous.clone();
    }

    if let Some(root) = merge_root(a, b, root_is_wildcard) {
        cache.insert(cache_key(a, b), root.clone());
        return root;
    }

    let (a_parent, a_return) = a.as_single_frame().expect("single-frame operand");
    let (b_parent, b_return) = b.as_single_frame().expect("single-frame operand");

    let merged = if a_return == b_return {
        let pa = a_parent.expect("non-root frame has a parent");
        let pb = b_parent.expect("non-root frame has a parent");
        let parent = merge(pa, pb, root_is_wildcard, cache);
        if Arc::ptr_eq(&parent, pa) {
            a.clone()
        } else if Arc::ptr_eq(&parent, pb) {
            b.clone()
        } else {
            PredictionContext::singleton(Some(parent), a_return)
        }
    } else {
        // Distinct return states become a two-frame array sorted ascending;
        // the empty sentinel is the largest value, so it lands last.
        let shared_parent = match (a_parent, b_parent) {
            (Some(x), Some(y)) if Arc::ptr_eq(x, y) || x == y => Some(x.clone()),
            _ => None,
        };
        if let Some(parent) = shared_parent {
            let (lo, hi) = if a_return < b_return {
                (a_return, b_return)
            } else {
                (b_return, a_return)
            };
            PredictionContext::array(vec![Some(parent.clone()), Some(parent)], vec![lo, hi])
        } else if a_return < b_return {
            PredictionContext::array(
                vec![a_parent.cloned(), b_parent.cloned()],
                vec![a_return, b_return],
            )
        } else {
            PredictionContext::array(
                vec![b_parent.cloned(), a_parent.cloned()],
                vec![b_return, a_return],
            )
        }
    };
    cache.insert(cache_key(a, b), merged.clone());
    merged
}

/// Handle merges where one operand is the empty root. Returns `None` when
/// neither operand is empty.
fn merge_root(
    a: &Arc<PredictionContext>,
    b: &Arc<PredictionContext>,
    root_is_wildcard: bool,
) -> Option<Arc<PredictionContext>> {
    if root_is_wildcard {
        if a.is_empty() || b.is_empty() {
            return Some(PredictionContext::empty());
        }
        return None;
    }
    if a.is_empty() && b.is_empty() {
        return Some(PredictionContext::empty());
    }
    if a.is_empty() {
        let (parent, rs) = b.as_single_frame().expect("single-frame operand");
        return Some(PredictionContext::array(
            vec![parent.cloned(), None],
            vec![rs, EMPTY_RETURN_STATE],
        ));
    }
    if b.is_empty() {
        let (parent, rs) = a.as_single_frame().expect("single-frame operand");
        return Some(PredictionContext::array(
            vec![parent.cloned(), None],
            vec![rs, EMPTY_RETURN_STATE],
        ));
    }
    None
}

fn merge_arrays(
    a: &Arc<PredictionContext>,
    b: &Arc<PredictionContext>,
    root_is_wildcard: bool,
    cache: &mut MergeCache,
) -> Arc<PredictionContext> {
    if let Some(previous) = cache.get(&cache_key(a, b)) {
        return previous.clone();
    }
    if let Some(previous) = cache.get(&cache_key(b, a)) {
        return previous.clone();
    }

    let (a_parents, a_returns) = a.frames();
    let (b_parents, b_returns) = b.frames();
    let mut parents: Vec<Option<Arc<PredictionContext>>> = Vec::new();
    let mut returns: Vec<u32> = Vec::new();

    let (mut i, mut j) = (0, 0);
    while i < a_returns.len() && j < b_returns.len() {
        let ar = a_returns[i];
        let br = b_returns[j];
        if ar == br {
            // Equal return states: coalesce the frame, merging parents.
            let ap = &a_parents[i];
            let bp = &b_parents[j];
            let both_root = ar == EMPTY_RETURN_STATE && ap.is_none() && bp.is_none();
            let parent = if both_root || parent_eq(ap, bp) {
                ap.clone()
            } else {
                let pa = ap.as_ref().expect("non-root frame has a parent");
                let pb = bp.as_ref().expect("non-root frame has a parent");
                Some(merge(pa, pb, root_is_wildcard, cache))
            };
            parents.push(parent);
            returns.push(ar);
            i += 1;
            j += 1;
        } else if ar < br {
            parents.push(a_parents[i].clone());
            returns.push(ar);
            i += 1;
        } else {
            parents.push(b_parents[j].clone());
            returns.push(br);
            j += 1;
        }
    }
    parents.extend_from_slice(&a_parents[i..]);
    returns.extend_from_slice(&a_returns[i..]);
    parents.extend_from_slice(&b_parents[j..]);
    returns.extend_from_slice(&b_returns[j..]);

    let merged = if returns.len() == 1 {
        PredictionContext::singleton(parents.pop().flatten(), returns[0])
    } else {
        combine_common_parents(&mut parents);
        PredictionContext::array(parents, returns)
    };

    // Degenerate merges collapse back to an operand.
    let merged = if *merged == **a {
        a.clone()
    } else if *merged == **b {
        b.clone()
    } else {
        merged
    };
    cache.insert(cache_key(a, b), merged.clone());
    merged
}

/// Replace structurally equal parents with a single representative so the
/// result shares as much as possible.
fn combine_common_parents(parents: &mut [Option<Arc<PredictionContext>>]) {
    let mut unique: HashMap<Arc<PredictionContext>, Arc<PredictionContext>, ahash::RandomState> =
        HashMap::default();
    for slot in parents.iter_mut() {
        if let Some(parent) = slot.take() {
            let representative = unique.entry(parent.clone()).or_insert(parent).clone();
            *slot = Some(representative);
        }
    }
}

/// Grammar-lifetime interning table for context subgraphs. Shared by every
/// lexer instance generated from one grammar; see the concurrency contract
/// in the crate docs.
#[derive(Debug, Default)]
pub struct SharedContextCache {
    map: Mutex<HashMap<Arc<PredictionContext>, Arc<PredictionContext>, ahash::RandomState>>,
}

impl SharedContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `context`, returning the canonical instance.
    pub fn add(&self, context: Arc<PredictionContext>) -> Arc<PredictionContext> {
        let mut map = self.map.lock().expect("context cache poisoned");
        match map.get(&context) {
            Some(existing) => existing.clone(),
            None => {
                map.insert(context.clone(), context.clone());
                context
            }
        }
    }

    #[must_use]
    pub fn get(&self, context: &PredictionContext) -> Option<Arc<PredictionContext>> {
        self.map
            .lock()
            .expect("context cache poisoned")
            .get(context)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.lock().expect("context cache poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity map used within one `get_cached_context` traversal.
pub type VisitedContexts =
    HashMap<usize, Arc<PredictionContext>, ahash::RandomState>;

/// Rebuild `context` out of nodes owned by `cache`, replacing structurally
/// equal subgraphs with their cached representative. The result is
/// structurally equal to the input and physically canonical.
pub fn get_cached_context(
    context: &Arc<PredictionContext>,
    cache: &SharedContextCache,
    visited: &mut VisitedContexts,
) -> Arc<PredictionContext> {
    if context.is_empty() {
        return context.clone();
    }
    let identity = Arc::as_ptr(context) as usize;
    if let Some(existing) = visited.get(&identity) {
        return existing.clone();
    }
    if let Some(cached) = cache.get(context) {
        visited.insert(identity, cached.clone());
        return cached;
    }

    let mut changed = false;
    let mut parents: Vec<Option<Arc<PredictionContext>>> = Vec::with_capacity(context.len());
    for index in 0..context.len() {
        match context.parent(index) {
            None => parents.push(None),
            Some(parent) => {
                let cached_parent = get_cached_context(parent, cache, visited);
                if !Arc::ptr_eq(&cached_parent, parent) {
                    changed = true;
                }
                parents.push(Some(cached_parent));
            }
        }
    }

    if !changed {
        let interned = cache.add(context.clone());
        visited.insert(identity, interned.clone());
        return interned;
    }

    let updated = if context.len() == 1 {
        PredictionContext::singleton(parents.pop().flatten(), context.return_state(0))
    } else {
        let returns: Vec<u32> = (0..context.len()).map(|i| context.return_state(i)).collect();
        PredictionContext::array(parents, returns)
    };
    let interned = cache.add(updated);
    visited.insert(Arc::as_ptr(&interned) as usize, interned.clone());
    visited.insert(identity, interned.clone());
    interned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(returns: &[u32]) -> Arc<PredictionContext> {
        let mut ctx = PredictionContext::empty();
        for rs in returns {
            ctx = PredictionContext::singleton(Some(ctx), *rs);
        }
        ctx
    }

    #[test]
    fn test_singleton_folds_to_empty() {
        let ctx = PredictionContext::singleton(None, EMPTY_RETURN_STATE);
        assert!(ctx.is_empty());
        assert!(Arc::ptr_eq(&ctx, &PredictionContext::empty()));
    }

    #[test]
    fn test_empty_reports_sentinel_frame() {
        let empty = PredictionContext::empty();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.return_state(0), EMPTY_RETURN_STATE);
        assert!(empty.parent(0).is_none());
        assert!(empty.has_empty_path());
    }

    #[test]
    fn test_structural_equality_across_instances() {
        let a = chain(&[3, 7]);
        let b = chain(&[3, 7]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(chain(&[3, 7]), chain(&[7, 3]));
    }

    #[test]
    fn test_merge_identity() {
        let mut cache = MergeCache::default();
        let a = chain(&[5]);
        let b = chain(&[5]);
        let merged = merge(&a, &b, true, &mut cache);
        assert!(Arc::ptr_eq(&merged, &a));
    }

    #[test]
    fn test_merge_wildcard_root_absorbs() {
        let mut cache = MergeCache::default();
        let a = chain(&[5]);
        let empty = PredictionContext::empty();
        assert!(merge(&a, &empty, true, &mut cache).is_empty());
        assert!(merge(&empty, &a, true, &mut cache).is_empty());
    }

    #[test]
    fn test_merge_full_root_preserved() {
        let mut cache = MergeCache::default();
        let a = chain(&[5]);
        let empty = PredictionContext::empty();
        let merged = merge(&a, &empty, false, &mut cache);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.return_state(0), 5);
        assert_eq!(merged.return_state(1), EMPTY_RETURN_STATE);
        assert!(merged.has_empty_path());
    }

    #[test]
    fn test_merge_distinct_returns_sorted() {
        let mut cache = MergeCache::default();
        let merged = merge(&chain(&[9]), &chain(&[2]), true, &mut cache);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.return_state(0), 2);
        assert_eq!(merged.return_state(1), 9);
    }

    #[test]
    fn test_merge_equal_returns_merges_parents() {
        let mut cache = MergeCache::default();
        let a = chain(&[1, 4]);
        let b = chain(&[2, 4]);
        let merged = merge(&a, &b, true, &mut cache);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.return_state(0), 4);
        let parent = merged.parent(0).expect("parent");
        assert_eq!(parent.len(), 2);
        assert_eq!(parent.return_state(0), 1);
        assert_eq!(parent.return_state(1), 2);
    }

    #[test]
    fn test_merge_commutative() {
        let mut cache = MergeCache::default();
        let a = chain(&[1, 4]);
        let b = chain(&[2, 4]);
        let ab = merge(&a, &b, true, &mut cache);
        let ba = merge(&b, &a, true, &mut cache);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_cache_hit_returns_same_object() {
        let mut cache = MergeCache::default();
        let a = chain(&[1]);
        let b = chain(&[2]);
        let first = merge(&a, &b, true, &mut cache);
        let second = merge(&a, &b, true, &mut cache);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_array_merge_interleaves() {
        let mut cache = MergeCache::default();
        let ab = merge(&chain(&[1]), &chain(&[3]), true, &mut cache);
        let cd = merge(&chain(&[2]), &chain(&[4]), true, &mut cache);
        let merged = merge(&ab, &cd, true, &mut cache);
        assert_eq!(merged.len(), 4);
        let states: Vec<u32> = (0..4).map(|i| merged.return_state(i)).collect();
        assert_eq!(states, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_shared_cache_interns() {
        let cache = SharedContextCache::new();
        let mut visited = VisitedContexts::default();
        let a = get_cached_context(&chain(&[3, 7]), &cache, &mut visited);
        let mut visited = VisitedContexts::default();
        let b = get_cached_context(&chain(&[3, 7]), &cache, &mut visited);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_shared_cache_canonicalizes_parents() {
        let cache = SharedContextCache::new();
        let mut visited = VisitedContexts::default();
        let first = get_cached_context(&chain(&[3]), &cache, &mut visited);
        // A fresh chain with a structurally equal (but distinct) parent
        // subgraph is rebuilt on top of the cached parent.
        let taller = PredictionContext::singleton(Some(chain(&[3])), 9);
        let mut visited = VisitedContexts::default();
        let cached = get_cached_context(&taller, &cache, &mut visited);
        assert_eq!(*cached, *taller);
        assert!(Arc::ptr_eq(
            cached.parent(0).expect("parent"),
            &first
        ));
    }
}
