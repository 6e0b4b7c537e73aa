use crate::backref::{BackRefArena, BackRefSlot};
use crate::descriptions::Cond;
use crate::error::CompileError;
use crate::lexer::Lexer;
use crate::parser;
use crate::tree::Tree;
use std::cell::RefCell;
use std::collections::HashMap;

/// Counts how many `that`s satisfy `cond` at `node`.
///
/// `Rel` counts relation targets that pass the attached description;
/// `negated` collapses that count to 0/1, `optional` floors it at 1. `And`
/// multiplies (short-circuiting on a zero factor), `Or` sums, `Not` inverts
/// its operand's zero-ness, `Opt` floors its operand at 1.
///
/// `commit` controls whether a passing branch is allowed to record the
/// names it declares. Evaluation always runs dry first to find out whether
/// a branch will matter at all (an `And` factor that turns out zero, or a
/// negated relation that turns out forbidden, must leave no bindings
/// behind), then re-runs only the branches that survive with `commit =
/// true`. `Not`'s operand never commits — naming is rejected under
/// negation at parse time, so there is nothing there to commit anyway.
pub fn eval<T: Tree>(cond: &Cond<T>, node: &T, arena: &BackRefArena<T>, commit: bool) -> usize {
    match cond {
        Cond::Rel(rel, desc) => {
            let candidates = rel.enumerate(node, arena);
            let matching: Vec<&T> = candidates.iter().filter(|that| desc.check(that, arena, false)).collect();
            let matches = matching.len();
            let outcome = if rel.negated {
                usize::from(matches == 0)
            } else if rel.optional {
                1
            } else {
                matches
            };
            if commit && outcome != 0 {
                for that in &matching {
                    desc.check(that, arena, true);
                }
            }
            outcome
        }
        Cond::And(conds) => {
            let mut total = 1usize;
            for c in conds {
                let n = eval(c, node, arena, false);
                if n == 0 {
                    return 0;
                }
                total *= n;
            }
            if commit {
                for c in conds {
                    eval(c, node, arena, true);
                }
            }
            total
        }
        Cond::Or(conds) => conds.iter().map(|c| eval(c, node, arena, commit)).sum(),
        Cond::Not(inner) => usize::from(eval(inner, node, arena, false) == 0),
        Cond::Opt(inner) => eval(inner, node, arena, commit).max(1),
    }
}

/// A compiled pattern: the top-level (anchor, trailing condition) pairs
/// produced by `expr := named_nodes (';' named_nodes)*`, plus the slot
/// layout its back-references need.
pub struct Pattern<T: Tree> {
    source: String,
    top_level: Vec<crate::descriptions::NodeDescriptions<T>>,
    slot_count: usize,
    name_slots: HashMap<String, BackRefSlot>,
    last_bindings: RefCell<HashMap<String, Vec<T>>>,
}

impl<T: Tree> Pattern<T> {
    /// Tokenizes and parses `source` once. No tree is required at this
    /// point — relation arguments and back-references are resolved lazily,
    /// against whichever tree `find_all` is later called with.
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let tokens = Lexer::new(source).tokenize()?;
        let parsed = parser::parse::<T>(tokens)?;
        Ok(Pattern {
            source: source.to_string(),
            top_level: parsed.top_level,
            slot_count: parsed.slot_count,
            name_slots: parsed.name_slots,
            last_bindings: RefCell::new(HashMap::new()),
        })
    }

    pub fn pattern_source(&self) -> &str {
        &self.source
    }

    /// All nodes of `tree` matching this pattern, in preorder, one entry
    /// per top-level alternative and repeated per its trailing condition's
    /// multiplicity. Also refreshes the bindings `bindings` returns.
    pub fn find_all(&self, tree: &T) -> Vec<T> {
        let arena = BackRefArena::new(self.slot_count);
        let mut out = Vec::new();
        for nd in &self.top_level {
            for node in tree.preorder_iter() {
                if !nd.matches_predicate(&node, &arena) {
                    continue;
                }
                let mult = nd.condition_count(&node, &arena, false);
                if mult == 0 {
                    continue;
                }
                nd.declare(&node, &arena);
                if nd.condition.is_some() {
                    nd.condition_count(&node, &arena, true);
                }
                for _ in 0..mult {
                    out.push(node.clone());
                }
            }
        }
        let mut bindings = HashMap::new();
        for (name, slot) in &self.name_slots {
            bindings.insert(name.clone(), arena.get(*slot));
        }
        *self.last_bindings.borrow_mut() = bindings;
        out
    }

    /// The nodes bound to `name` by the most recent `find_all` call on this
    /// `Pattern`. Empty if `name` never appears in the pattern, or if
    /// `find_all` hasn't run yet. Not meant to be read concurrently with a
    /// `find_all` call on the same instance from another thread.
    pub fn bindings(&self, name: &str) -> Vec<T> {
        self.last_bindings.borrow().get(name).cloned().unwrap_or_default()
    }
}

impl<T: Tree> Clone for Pattern<T> {
    fn clone(&self) -> Self {
        Pattern {
            source: self.source.clone(),
            top_level: self.top_level.clone(),
            slot_count: self.slot_count,
            name_slots: self.name_slots.clone(),
            last_bindings: RefCell::new(self.last_bindings.borrow().clone()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::test_tree::{parse, TestTree};

    #[test]
    fn simple_parent_child_pattern_matches() {
        let tree = parse("(S (NP (DT the) (NN cat)) (VP (VBD sat)))");
        let pattern = Pattern::<TestTree>::compile("NP < NN").unwrap();
        let matches = pattern.find_all(&tree);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label(), Some("NP"));
    }

    #[test]
    fn disjunction_at_top_level_yields_multiplicity_two() {
        let tree = parse("(foo bar (rab baz))");
        let pattern = Pattern::<TestTree>::compile("foo [ <bar || << baz ]").unwrap();
        let matches = pattern.find_all(&tree);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|n| n.label() == Some("foo")));
    }

    #[test]
    fn negated_bracket_excludes_when_either_branch_matches() {
        let tree = parse("(foo bar (rab baz))");
        let pattern = Pattern::<TestTree>::compile("foo ![ <ba || << qux ]").unwrap();
        let matches = pattern.find_all(&tree);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn missing_sister_yields_empty_result() {
        let tree = parse("(foo)");
        let pattern = Pattern::<TestTree>::compile("foo=a $ bar=a").unwrap();
        let matches = pattern.find_all(&tree);
        assert!(matches.is_empty());
        assert!(pattern.bindings("a").is_empty());
    }

    #[test]
    fn chained_relations_attach_to_the_same_anchor_and_share_a_name() {
        let tree = parse("(foo (bar (baz qux)))");
        let pattern = Pattern::<TestTree>::compile("foo=a <bar=a << baz=a").unwrap();
        let matches = pattern.find_all(&tree);
        assert_eq!(matches.len(), 1);
        let bound = pattern.bindings("a");
        let labels: Vec<_> = bound.iter().map(|n| n.label().unwrap().to_string()).collect();
        assert_eq!(labels, vec!["foo", "bar", "baz"]);
    }
}
