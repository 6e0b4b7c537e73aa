use crate::backref::BackRefArena;
use crate::descriptions::NodeDescriptions;
use crate::error::ParseError;
use crate::tree::Tree;

/// A structural relation, paired with the `negated`/`optional` flags the
/// surface syntax lets callers prefix a relation with (`!<<`, `?<`, ...).
#[derive(Debug, Clone)]
pub struct RelDescriptor<T: Tree> {
    pub op: RelOp<T>,
    pub negated: bool,
    pub optional: bool,
    pub source: String,
}

impl<T: Tree> RelDescriptor<T> {
    pub fn plain(op: RelOp<T>, source: String) -> Self {
        RelDescriptor {
            op,
            negated: false,
            optional: false,
            source,
        }
    }

    /// Wraps an existing descriptor in negation. Errors if it is already
    /// optional — `negated` and `optional` are mutually exclusive.
    pub fn negate(mut self) -> Result<Self, ParseError> {
        if self.optional {
            return Err(ParseError::NegatedAndOptionalConflict);
        }
        self.negated = true;
        self.source = format!("!{}", self.source);
        Ok(self)
    }

    pub fn make_optional(mut self) -> Result<Self, ParseError> {
        if self.negated {
            return Err(ParseError::NegatedAndOptionalConflict);
        }
        self.optional = true;
        self.source = format!("?{}", self.source);
        Ok(self)
    }

    /// All `that` nodes in relation to `this`, in source order. `arg`
    /// relations (`<+`, `>+`, ...) need the arena to evaluate their bracketed
    /// argument pattern against the current tree.
    pub fn enumerate(&self, this: &T, arena: &BackRefArena<T>) -> Vec<T> {
        self.op.enumerate(this, arena)
    }
}

#[derive(Debug, Clone)]
pub enum RelOp<T: Tree> {
    Plain(PlainOp),
    /// The argument is the node-description pattern written between the
    /// relation's parens (e.g. the `X` in `<+(X)`), evaluated against the
    /// current tree each time the relation fires — it isn't known until a
    /// concrete tree is in hand.
    WithStrArg(StrArgOp, Box<NodeDescriptions<T>>),
    WithNumArg(NumArgOp, i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlainOp {
    ParentOf,
    ChildOf,
    Dominates,
    DominatedBy,
    HasOnlyChild,
    OnlyChildOf,
    FirstChildIs,
    IsFirstChildOf,
    LastChildIs,
    IsLastChildOf,
    LeftmostDescendantIs,
    RightmostDescendantIs,
    IsLeftmostDescendantOf,
    IsRightmostDescendantOf,
    SisterOf,
    LeftSisterOf,
    RightSisterOf,
    ImmediateLeftSisterOf,
    ImmediateRightSisterOf,
    Precedes,
    Follows,
    ImmediatelyPrecedes,
    ImmediatelyFollows,
    Equals,
    ParentEquals,
    UnaryDominates,
    UnaryDominatedBy,
    HeadChildIs,
    IsHeadChildOf,
    HeadTerminalIs,
    IsHeadTerminalOf,
    AncestorOfLeaf,
    /// `:`, the pattern splitter: `that` ranges over every node of `this`'s
    /// tree, independent of any structural relation to `this`. Lets `A : B`
    /// require `B` to match somewhere in the tree while still sharing `A`'s
    /// back-reference scope.
    PatternSplitter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrArgOp {
    UnbrokenCategoryDominates,
    UnbrokenCategoryIsDominatedBy,
    UnbrokenCategoryPrecedes,
    UnbrokenCategoryFollows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumArgOp {
    IthChildOf,
    HasIthChild,
    AncestorOfIthLeaf,
}

impl<T: Tree> RelOp<T> {
    pub fn enumerate(&self, this: &T, arena: &BackRefArena<T>) -> Vec<T> {
        match self {
            RelOp::Plain(op) => op.enumerate(this),
            RelOp::WithStrArg(op, arg_desc) => op.enumerate(this, arg_desc, arena),
            RelOp::WithNumArg(op, k) => op.enumerate(this, *k).into_iter().collect(),
        }
    }
}

fn ancestors<T: Tree>(node: &T) -> Vec<T> {
    let mut out = Vec::new();
    let mut cur = node.parent();
    while let Some(p) = cur {
        cur = p.parent();
        out.push(p);
    }
    out
}

fn root_of<T: Tree>(node: &T) -> T {
    let mut cur = node.clone();
    while let Some(p) = cur.parent() {
        cur = p;
    }
    cur
}

fn children_of<T: Tree>(node: &T) -> Vec<T> {
    node.children().collect()
}

fn sisters_of<T: Tree>(node: &T) -> Vec<T> {
    match node.parent() {
        Some(p) => children_of(&p).into_iter().filter(|c| c != node).collect(),
        None => Vec::new(),
    }
}

/// Sisters to the left of `node`, in left-to-right order.
fn left_sisters_of<T: Tree>(node: &T) -> Vec<T> {
    match node.parent() {
        Some(p) => {
            let kids = children_of(&p);
            let idx = kids.iter().position(|c| c == node).unwrap_or(0);
            kids[..idx].to_vec()
        }
        None => Vec::new(),
    }
}

fn right_sisters_of<T: Tree>(node: &T) -> Vec<T> {
    match node.parent() {
        Some(p) => {
            let kids = children_of(&p);
            let idx = kids.iter().position(|c| c == node).map(|i| i + 1).unwrap_or(kids.len());
            kids[idx..].to_vec()
        }
        None => Vec::new(),
    }
}

fn leftmost_spine<T: Tree>(node: &T) -> Vec<T> {
    let mut out = Vec::new();
    let mut cur = node.children().next();
    while let Some(c) = cur {
        cur = c.children().next();
        out.push(c);
    }
    out
}

fn rightmost_spine<T: Tree>(node: &T) -> Vec<T> {
    let mut out = Vec::new();
    let mut cur = node.children().last();
    while let Some(c) = cur {
        cur = c.children().last();
        out.push(c);
    }
    out
}

fn first_leaf<T: Tree>(node: &T) -> T {
    let mut cur = node.clone();
    while let Some(c) = cur.children().next() {
        cur = c;
    }
    cur
}

fn last_leaf<T: Tree>(node: &T) -> T {
    let mut cur = node.clone();
    while let Some(c) = cur.children().last() {
        cur = c;
    }
    cur
}

fn leaves_of<T: Tree>(root: &T) -> Vec<T> {
    root.preorder_iter().filter(|n| n.is_leaf()).collect()
}

fn leaf_index<T: Tree>(leaves: &[T], leaf: &T) -> usize {
    leaves.iter().position(|n| n == leaf).expect("leaf belongs to its own tree's leaf sequence")
}

fn ith_from(len: usize, k: i64) -> Option<usize> {
    if k > 0 {
        let i = (k - 1) as usize;
        (i < len).then_some(i)
    } else if k < 0 {
        let i = len as i64 + k;
        (i >= 0).then_some(i as usize)
    } else {
        None
    }
}

impl PlainOp {
    pub fn enumerate<T: Tree>(&self, this: &T) -> Vec<T> {
        use PlainOp::*;
        match self {
            ParentOf => children_of(this),
            ChildOf => this.parent().into_iter().collect(),
            Dominates => this.preorder_iter().skip(1).collect(),
            DominatedBy => ancestors(this),
            HasOnlyChild => {
                let kids = children_of(this);
                if kids.len() == 1 {
                    kids
                } else {
                    Vec::new()
                }
            }
            OnlyChildOf => match this.parent() {
                Some(p) if children_of(&p).len() == 1 => vec![p],
                _ => Vec::new(),
            },
            FirstChildIs => children_of(this).into_iter().next().into_iter().collect(),
            IsFirstChildOf => match this.parent() {
                Some(p) if children_of(&p).first() == Some(this) => vec![p],
                _ => Vec::new(),
            },
            LastChildIs => children_of(this).into_iter().last().into_iter().collect(),
            IsLastChildOf => match this.parent() {
                Some(p) if children_of(&p).last() == Some(this) => vec![p],
                _ => Vec::new(),
            },
            LeftmostDescendantIs => leftmost_spine(this),
            RightmostDescendantIs => rightmost_spine(this),
            IsLeftmostDescendantOf => ancestors(this).into_iter().filter(|a| leftmost_spine(a).contains(this)).collect(),
            IsRightmostDescendantOf => ancestors(this).into_iter().filter(|a| rightmost_spine(a).contains(this)).collect(),
            SisterOf => sisters_of(this),
            LeftSisterOf => right_sisters_of(this),
            RightSisterOf => left_sisters_of(this),
            ImmediateLeftSisterOf => right_sisters_of(this).into_iter().next().into_iter().collect(),
            ImmediateRightSisterOf => left_sisters_of(this).into_iter().last().into_iter().collect(),
            Precedes => {
                let root = root_of(this);
                let leaves = leaves_of(&root);
                let this_end = leaf_index(&leaves, &last_leaf(this));
                root.preorder_iter()
                    .filter(|n| n != this)
                    .filter(|n| leaf_index(&leaves, &first_leaf(n)) > this_end)
                    .collect()
            }
            Follows => {
                let root = root_of(this);
                let leaves = leaves_of(&root);
                let this_start = leaf_index(&leaves, &first_leaf(this));
                root.preorder_iter()
                    .filter(|n| n != this)
                    .filter(|n| leaf_index(&leaves, &last_leaf(n)) < this_start)
                    .collect()
            }
            ImmediatelyPrecedes => {
                let root = root_of(this);
                let leaves = leaves_of(&root);
                let this_end = leaf_index(&leaves, &last_leaf(this));
                root.preorder_iter()
                    .filter(|n| n != this)
                    .filter(|n| leaf_index(&leaves, &first_leaf(n)) == this_end + 1)
                    .collect()
            }
            ImmediatelyFollows => {
                let root = root_of(this);
                let leaves = leaves_of(&root);
                let this_start = leaf_index(&leaves, &first_leaf(this));
                if this_start == 0 {
                    return Vec::new();
                }
                root.preorder_iter()
                    .filter(|n| n != this)
                    .filter(|n| leaf_index(&leaves, &last_leaf(n)) == this_start - 1)
                    .collect()
            }
            Equals => vec![this.clone()],
            ParentEquals => {
                let mut out = vec![this.clone()];
                out.extend(children_of(this));
                out
            }
            UnaryDominates => {
                let mut out = Vec::new();
                let mut cur = this.clone();
                loop {
                    let kids = children_of(&cur);
                    if kids.len() != 1 {
                        break;
                    }
                    cur = kids.into_iter().next().unwrap();
                    out.push(cur.clone());
                }
                out
            }
            UnaryDominatedBy => {
                let mut out = Vec::new();
                let mut cur = this.clone();
                while let Some(p) = cur.parent() {
                    if children_of(&p).len() != 1 {
                        break;
                    }
                    out.push(p.clone());
                    cur = p;
                }
                out
            }
            HeadChildIs => this.head_child().into_iter().collect(),
            IsHeadChildOf => match this.parent() {
                Some(p) if p.head_child().as_ref() == Some(this) => vec![p],
                _ => Vec::new(),
            },
            HeadTerminalIs => this.head_terminal().into_iter().collect(),
            IsHeadTerminalOf => ancestors(this).into_iter().filter(|a| a.head_terminal().as_ref() == Some(this)).collect(),
            AncestorOfLeaf => this.preorder_iter().skip(1).filter(|n| n.is_leaf()).collect(),
            PatternSplitter => root_of(this).preorder_iter().collect(),
        }
    }
}

impl StrArgOp {
    /// Materializes the argument set by matching `arg_desc` against every
    /// node of `this`'s tree, then delegates to the membership-walk logic.
    pub fn enumerate<T: Tree>(
        &self,
        this: &T,
        arg_desc: &NodeDescriptions<T>,
        arena: &BackRefArena<T>,
    ) -> Vec<T> {
        let root = root_of(this);
        // Dry: membership in the argument set shouldn't itself bind names.
        let arg: Vec<T> = root.preorder_iter().filter(|n| arg_desc.check(n, arena, false)).collect();
        self.enumerate_with_arg(this, &arg)
    }

    fn enumerate_with_arg<T: Tree>(&self, this: &T, arg: &[T]) -> Vec<T> {
        use StrArgOp::*;
        let in_arg = |n: &T| arg.iter().any(|a| a == n);
        match self {
            UnbrokenCategoryDominates => this
                .preorder_iter()
                .skip(1)
                .filter(|d| {
                    let mut cur = d.parent().unwrap();
                    while &cur != this {
                        if !in_arg(&cur) {
                            return false;
                        }
                        cur = cur.parent().unwrap();
                    }
                    true
                })
                .collect(),
            UnbrokenCategoryIsDominatedBy => ancestors(this)
                .into_iter()
                .filter(|a| {
                    let mut cur = this.parent().unwrap();
                    while &cur != a {
                        if !in_arg(&cur) {
                            return false;
                        }
                        cur = cur.parent().unwrap();
                    }
                    true
                })
                .collect(),
            UnbrokenCategoryPrecedes => {
                let mut out = Vec::new();
                let mut chain = right_sisters_of(this).into_iter();
                for s in chain.by_ref() {
                    out.push(s.clone());
                    if !in_arg(&s) {
                        break;
                    }
                }
                out
            }
            UnbrokenCategoryFollows => {
                let mut out = Vec::new();
                let mut chain = left_sisters_of(this).into_iter().rev();
                for s in chain.by_ref() {
                    out.push(s.clone());
                    if !in_arg(&s) {
                        break;
                    }
                }
                out
            }
        }
    }
}

impl NumArgOp {
    pub fn enumerate<T: Tree>(&self, this: &T, k: i64) -> Option<T> {
        use NumArgOp::*;
        match self {
            IthChildOf => this.parent().and_then(|p| {
                let kids = children_of(&p);
                ith_from(kids.len(), k).map(|i| kids[i].clone())
            }),
            HasIthChild => {
                let kids = children_of(this);
                ith_from(kids.len(), k).map(|i| kids[i].clone())
            }
            AncestorOfIthLeaf => {
                let leaves: Vec<T> = this.preorder_iter().filter(|n| n.is_leaf()).collect();
                ith_from(leaves.len(), k).map(|i| leaves[i].clone())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::test_tree::parse;

    #[test]
    fn parent_of_yields_children() {
        let t = parse("(foo bar baz)");
        let kids = PlainOp::ParentOf.enumerate(&t);
        let labels: Vec<_> = kids.iter().map(|n| n.label().unwrap().to_string()).collect();
        assert_eq!(labels, vec!["bar", "baz"]);
    }

    #[test]
    fn dominates_yields_all_proper_descendants() {
        let t = parse("(foo bar (rab (baz bar)))");
        let desc = PlainOp::Dominates.enumerate(&t);
        assert_eq!(desc.len(), 4);
    }

    #[test]
    fn precedes_uses_leaf_span_order() {
        let t = parse("(S (NP (DT the) (NN cat)) (VP (VBD sat)))");
        let np = t.children().next().unwrap();
        let vp = t.children().last().unwrap();
        let precedes = PlainOp::Precedes.enumerate(&np);
        assert!(precedes.iter().any(|n| n == &vp));
        assert!(!PlainOp::Precedes.enumerate(&vp).iter().any(|n| n == &np));
    }

    #[test]
    fn ith_child_indexing_supports_negative() {
        let t = parse("(foo a b c)");
        assert_eq!(ith_from(3, 1), Some(0));
        assert_eq!(ith_from(3, -1), Some(2));
        assert_eq!(ith_from(3, 4), None);
        let last = NumArgOp::HasIthChild.enumerate(&t, -1).unwrap();
        assert_eq!(last.label(), Some("c"));
    }

    #[test]
    fn sister_relations_respect_order() {
        let t = parse("(A (B 1) (C 2) (B 3))");
        let kids = children_of(&t);
        let first_b = &kids[0];
        let right = right_sisters_of(first_b);
        assert_eq!(right.len(), 2);
        let left = left_sisters_of(&kids[2]);
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn left_sister_of_points_rightward_like_precedes() {
        let t = parse("(A (B 1) (C 2))");
        let kids = children_of(&t);
        let b = &kids[0];
        let c = &kids[1];
        assert!(PlainOp::LeftSisterOf.enumerate(b).iter().any(|n| n == c));
        assert!(!PlainOp::LeftSisterOf.enumerate(c).iter().any(|n| n == b));
        assert_eq!(PlainOp::ImmediateLeftSisterOf.enumerate(b), vec![c.clone()]);
        assert!(PlainOp::ImmediateLeftSisterOf.enumerate(c).is_empty());
    }

    #[test]
    fn parent_equals_yields_self_and_children() {
        let t = parse("(A (B 1) (C 2))");
        let out = PlainOp::ParentEquals.enumerate(&t);
        let labels: Vec<_> = out.iter().map(|n| n.label().unwrap().to_string()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }

    #[test]
    fn pattern_splitter_ranges_over_the_whole_tree() {
        let t = parse("(A (B 1) (C 2))");
        let b = children_of(&t)[0].clone();
        let whole = PlainOp::PatternSplitter.enumerate(&b);
        assert_eq!(whole.len(), t.preorder_iter().count());
    }
}
