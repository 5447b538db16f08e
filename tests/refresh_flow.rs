use std::collections::HashMap;

use drawflow::{
    content_hash, CacheKey, ContextId, Drawing, EvalServices, Evaluator, EventKind, Layout,
    LayoutCache, LayoutItem, RefreshOptions, RefreshRuntime, TextSpan, TreeId,
};

const ROOT_BODY: u64 = 1;
const CHILD_BODY: u64 = 2;
const GRANDCHILD_BODY: u64 = 3;
const CTX_A: u64 = 10;
const CTX_A_TWIN: u64 = 11;
const CTX_B: u64 = 12;

/// Evaluator with a fixed script per body tree, recording evaluations.
struct ScriptedEvaluator {
    evaluated: Vec<u64>,
    bindings: HashMap<u64, &'static str>,
}

impl ScriptedEvaluator {
    fn new() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(CTX_A, "page = 1");
        bindings.insert(CTX_A_TWIN, "page = 1");
        bindings.insert(CTX_B, "page = 2");
        Self {
            evaluated: Vec::new(),
            bindings,
        }
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(&mut self, body: TreeId, layout: &mut Layout, services: &mut EvalServices<'_>) {
        self.evaluated.push(body.0);
        match body.0 {
            ROOT_BODY => {
                layout.add(Box::new(TextSpan::new("root")));
                layout.refresh_on(EventKind::Key, 0.0);
            }
            CHILD_BODY => {
                layout.add(Box::new(TextSpan::new("child")));
                layout.refresh_on(EventKind::Key, 0.0);
                layout.refresh_on(EventKind::Time, 5.0);
                let tree = self.tree_hash(TreeId(GRANDCHILD_BODY));
                let ctx = self.context_hash(ContextId(CTX_A));
                if let Some(cached) = services.take_cached(tree, ctx) {
                    layout.adopt(cached);
                } else {
                    let key = services
                        .cache_enabled()
                        .then(|| CacheKey::new(tree, ctx));
                    let grandchild =
                        layout.add_child(7, TreeId(GRANDCHILD_BODY), ContextId(CTX_A), key);
                    self.evaluate(TreeId(GRANDCHILD_BODY), grandchild, services);
                }
            }
            GRANDCHILD_BODY => {
                layout.add(Box::new(TextSpan::new("grandchild")));
            }
            _ => {}
        }
    }

    fn tree_hash(&self, body: TreeId) -> u64 {
        content_hash(&body.0.to_le_bytes())
    }

    fn context_hash(&self, ctx: ContextId) -> u64 {
        let content = self.bindings.get(&ctx.0).copied().unwrap_or("");
        content_hash(content.as_bytes())
    }
}

/// Build a root with one evaluated child layout, the way an application
/// would bootstrap a document.
fn build_tree(evaluator: &mut ScriptedEvaluator, cache_enabled: bool) -> Layout {
    let mut root = Layout::new();
    let mut cache = LayoutCache::new();
    let mut services = EvalServices::new(&mut cache, cache_enabled);
    let tree = evaluator.tree_hash(TreeId(CHILD_BODY));
    let ctx = evaluator.context_hash(ContextId(CTX_A));
    let key = cache_enabled.then(|| CacheKey::new(tree, ctx));
    let child = root.add_child(5, TreeId(CHILD_BODY), ContextId(CTX_A), key);
    evaluator.evaluate(TreeId(CHILD_BODY), child, &mut services);
    root
}

fn item_ptrs(layout: &Layout) -> Vec<*const ()> {
    layout
        .items()
        .iter()
        .map(|item| match item {
            LayoutItem::Drawing(drawing) => drawing.as_ref() as *const dyn Drawing as *const (),
            LayoutItem::Child(child) => child.as_ref() as *const Layout as *const (),
        })
        .collect()
}

fn child_layout(root: &Layout) -> &Layout {
    root.items()
        .iter()
        .find_map(|item| match item {
            LayoutItem::Child(child) => Some(child.as_ref()),
            _ => None,
        })
        .expect("tree has a child layout")
}

fn grandchild_ptr(root: &Layout) -> *const Layout {
    child_layout(root)
        .items()
        .iter()
        .find_map(|item| match item {
            LayoutItem::Child(child) => Some(child.as_ref() as *const Layout),
            _ => None,
        })
        .expect("child has a grandchild layout")
}

#[test]
fn refresh_ignores_unregistered_event_kinds() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = build_tree(&mut evaluator, true);
    let root_items = item_ptrs(&root);
    let child_items = item_ptrs(child_layout(&root));
    evaluator.evaluated.clear();

    let changed = {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        root.refresh(EventKind::Mouse, 0.0, &mut rt)
    };

    assert!(!changed);
    assert!(evaluator.evaluated.is_empty());
    assert_eq!(item_ptrs(&root), root_items);
    assert_eq!(item_ptrs(child_layout(&root)), child_items);
}

#[test]
fn registered_events_reevaluate_and_reuse_cached_sublayouts() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = build_tree(&mut evaluator, true);
    let grandchild_before = grandchild_ptr(&root);
    evaluator.evaluated.clear();

    let changed = {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        let changed = root.refresh(EventKind::Key, 0.0, &mut rt);
        // The cache lives exactly one pass.
        assert!(rt.cache.is_empty());
        changed
    };

    assert!(changed);
    // The child re-evaluated; the grandchild came back from the cache
    // as the identical layout instead of being rebuilt.
    assert_eq!(evaluator.evaluated, vec![CHILD_BODY]);
    assert_eq!(grandchild_ptr(&root), grandchild_before);
}

#[test]
fn disabling_the_cache_rebuilds_sublayouts() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = build_tree(&mut evaluator, false);
    let grandchild_before = grandchild_ptr(&root);
    evaluator.evaluated.clear();

    let options = RefreshOptions {
        cache_enabled: false,
    };
    let changed = {
        let mut rt = RefreshRuntime::new(&mut evaluator, options);
        root.refresh(EventKind::Key, 0.0, &mut rt)
    };

    assert!(changed);
    assert_eq!(evaluator.evaluated, vec![CHILD_BODY, GRANDCHILD_BODY]);
    assert_ne!(grandchild_ptr(&root), grandchild_before);
}

#[test]
fn time_refresh_waits_for_the_deadline() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = build_tree(&mut evaluator, true);
    assert_eq!(child_layout(&root).next_refresh(), 5.0);
    evaluator.evaluated.clear();

    let early = {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        root.refresh(EventKind::Time, 1.0, &mut rt)
    };
    assert!(!early);
    assert!(evaluator.evaluated.is_empty());

    let due = {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        root.refresh(EventKind::Time, 6.0, &mut rt)
    };
    assert!(due);
    assert_eq!(evaluator.evaluated, vec![CHILD_BODY]);
}

#[test]
fn dirty_root_without_parent_skips_evaluation() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = Layout::new();
    root.attach_body(TreeId(ROOT_BODY), ContextId(CTX_A));
    {
        let mut cache = LayoutCache::new();
        let mut services = EvalServices::new(&mut cache, true);
        evaluator.evaluate(TreeId(ROOT_BODY), &mut root, &mut services);
    }
    let items_before = item_ptrs(&root);
    evaluator.evaluated.clear();

    let changed = {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        root.refresh(EventKind::Key, 0.0, &mut rt)
    };

    // The root is dirty but has no parent: the condition is logged and
    // evaluation skipped, leaving the tree untouched.
    assert!(!changed);
    assert!(evaluator.evaluated.is_empty());
    assert_eq!(item_ptrs(&root), items_before);
}

#[test]
fn context_hashes_depend_on_binding_content_not_identity() {
    let evaluator = ScriptedEvaluator::new();
    assert_eq!(
        evaluator.context_hash(ContextId(CTX_A)),
        evaluator.context_hash(ContextId(CTX_A_TWIN))
    );
    assert_ne!(
        evaluator.context_hash(ContextId(CTX_A)),
        evaluator.context_hash(ContextId(CTX_B))
    );
}

#[test]
fn refresh_registrations_survive_reevaluation() {
    let mut evaluator = ScriptedEvaluator::new();
    let mut root = build_tree(&mut evaluator, true);

    for _ in 0..3 {
        let mut rt = RefreshRuntime::new(&mut evaluator, RefreshOptions::default());
        assert!(root.refresh(EventKind::Key, 0.0, &mut rt));
    }
    let events = child_layout(&root).refresh_events();
    assert!(events.contains(&EventKind::Key));
    assert!(events.contains(&EventKind::Time));
}
