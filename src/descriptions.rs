use crate::backref::{BackRefArena, BackRefSlot};
use crate::node_description::NodeDescription;
use crate::relation::RelDescriptor;
use crate::tree::Tree;

/// What a `NodeDescriptions` tests against: either a literal disjunction of
/// predicates, or a pure back-reference (`=name`) that matches exactly the
/// nodes previously bound to that name.
#[derive(Debug, Clone)]
pub enum DescriptionKind {
    Literal(Vec<NodeDescription>),
    BackRef(BackRefSlot),
}

/// A disjunction of node-description predicates plus the flags and optional
/// conjoined condition that the grammar hangs off it.
#[derive(Debug, Clone)]
pub struct NodeDescriptions<T: Tree> {
    pub kind: DescriptionKind,
    pub under_negation: bool,
    pub use_basic_cat: bool,
    pub condition: Option<Box<Cond<T>>>,
    /// The name this occurrence *declares*, if any (`X=n`). Distinct from a
    /// `BackRef` kind, which instead *reads* a name already declared.
    pub declares: Option<BackRefSlot>,
    pub source: String,
}

impl<T: Tree> NodeDescriptions<T> {
    /// Predicates XOR negation, ignoring any conjoined condition. Shared by
    /// the top-level anchor walk (which needs the condition's *count*, not
    /// just whether it's nonzero) and relation-target filtering (which only
    /// needs the boolean outcome, via `satisfies`).
    pub fn matches_predicate(&self, node: &T, arena: &BackRefArena<T>) -> bool {
        let attr = if self.use_basic_cat {
            node.basic_category()
        } else {
            node.label()
        };
        let is_root = node.parent().is_none();
        let base = match &self.kind {
            DescriptionKind::Literal(descs) => descs.iter().any(|d| d.test(attr, is_root)),
            DescriptionKind::BackRef(slot) => arena.contains(*slot, node),
        };
        base ^ self.under_negation
    }

    /// The conjoined condition's multiplicity at `node`, or 1 if there is
    /// none. `commit` controls whether the evaluation is allowed to record
    /// any names it declares along the way; pass `false` for a dry count.
    pub fn condition_count(&self, node: &T, arena: &BackRefArena<T>, commit: bool) -> usize {
        match &self.condition {
            Some(cond) => crate::matcher::eval(cond, node, arena, commit),
            None => 1,
        }
    }

    /// Records `node` under the name this occurrence declares, if any.
    pub fn declare(&self, node: &T, arena: &BackRefArena<T>) {
        if let Some(slot) = self.declares {
            arena.push(slot, node.clone());
        }
    }

    /// Predicate (XOR negation) AND a nonzero conjoined condition. When
    /// `commit` is true and the check passes, records this occurrence's own
    /// name first, then commits whatever its condition matched underneath —
    /// so a name's bindings read outside-in, and nothing commits at all
    /// along a branch that ultimately fails.
    pub fn check(&self, node: &T, arena: &BackRefArena<T>, commit: bool) -> bool {
        if !self.matches_predicate(node, arena) {
            return false;
        }
        if self.condition_count(node, arena, false) == 0 {
            return false;
        }
        if commit {
            self.declare(node, arena);
            if self.condition.is_some() {
                self.condition_count(node, arena, true);
            }
        }
        true
    }

    /// `check` with `commit = true`. Used when this description sits as a
    /// relation target (`that`).
    pub fn satisfies(&self, node: &T, arena: &BackRefArena<T>) -> bool {
        self.check(node, arena, true)
    }
}

/// The pattern AST: `Rel` is "this R that", the rest is the usual logical
/// algebra over conditions anchored at a single node.
#[derive(Debug, Clone)]
pub enum Cond<T: Tree> {
    Rel(RelDescriptor<T>, NodeDescriptions<T>),
    And(Vec<Cond<T>>),
    Or(Vec<Cond<T>>),
    Not(Box<Cond<T>>),
    Opt(Box<Cond<T>>),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::test_tree::{parse, TestTree};

    fn literal(id: &str) -> NodeDescriptions<TestTree> {
        NodeDescriptions {
            kind: DescriptionKind::Literal(vec![NodeDescription::Id(id.to_string())]),
            under_negation: false,
            use_basic_cat: false,
            condition: None,
            declares: None,
            source: id.to_string(),
        }
    }

    #[test]
    fn satisfies_checks_label_equality() {
        let t = parse("(foo bar)");
        let arena = BackRefArena::new(0);
        assert!(literal("foo").satisfies(&t, &arena));
        assert!(!literal("baz").satisfies(&t, &arena));
    }

    #[test]
    fn negation_flips_result() {
        let t = parse("(foo bar)");
        let arena = BackRefArena::new(0);
        let mut d = literal("baz");
        d.under_negation = true;
        assert!(d.satisfies(&t, &arena));
    }

    #[test]
    fn declaring_a_name_pushes_into_arena() {
        let t = parse("(foo bar)");
        let arena = BackRefArena::new(1);
        let mut d = literal("foo");
        d.declares = Some(BackRefSlot(0));
        assert!(d.satisfies(&t, &arena));
        assert_eq!(arena.get(BackRefSlot(0)).len(), 1);
    }

    #[test]
    fn backref_kind_matches_only_accumulated_nodes() {
        let t = parse("(foo bar)");
        let arena = BackRefArena::new(1);
        arena.push(BackRefSlot(0), t.clone());
        let d = NodeDescriptions {
            kind: DescriptionKind::BackRef(BackRefSlot(0)),
            under_negation: false,
            use_basic_cat: false,
            condition: None,
            declares: None,
            source: "=a".into(),
        };
        assert!(d.satisfies(&t, &arena));
        let other = parse("(baz)");
        assert!(!d.satisfies(&other, &arena));
    }
}
