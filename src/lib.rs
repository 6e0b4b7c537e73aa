/*!
This crate queries constituency parse trees with the Tregex pattern
language.

It provides a tree-shape-agnostic [`Tree`] trait, a compiler from Tregex
source text to a [`matcher::Pattern`], and the back-reference machinery
that pattern uses to report bound nodes by name. Implement `Tree` for
your own parse-tree representation, compile a pattern once, then run it
against as many trees as you like.
*/

pub mod backref;
pub mod descriptions;
pub mod error;
pub mod lexer;
pub mod matcher;
pub mod node_description;
pub mod parser;
pub mod relation;
pub mod tree;

pub use backref::{BackRefArena, BackRefSlot};
pub use descriptions::{Cond, DescriptionKind, NodeDescriptions};
pub use error::{CompileError, ParseError, SemanticError, TokenizeError};
pub use matcher::Pattern;
pub use node_description::{CompiledRegex, NodeDescription};
pub use parser::ParsedPattern;
pub use relation::{NumArgOp, PlainOp, RelDescriptor, RelOp, StrArgOp};
pub use tree::{Preorder, Tree};

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::test_tree::parse;

    #[test]
    fn compiles_and_runs_a_pattern_end_to_end() {
        let tree = parse("(S (NP (DT the) (NN cat)) (VP (VBD sat)))");
        let pattern = Pattern::compile("NP < NN=obj").unwrap();
        let matches = pattern.find_all(&tree);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label(), Some("NP"));
        let bound = pattern.bindings("obj");
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].label(), Some("NN"));
    }
}
