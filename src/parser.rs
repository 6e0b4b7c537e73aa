use crate::backref::BackRefSlot;
use crate::descriptions::{Cond, DescriptionKind, NodeDescriptions};
use crate::error::{CompileError, ParseError, SemanticError};
use crate::lexer::{Spanned, Token};
use crate::node_description::{CompiledRegex, NodeDescription};
use crate::relation::{NumArgOp, PlainOp, RelDescriptor, RelOp, StrArgOp};
use crate::tree::Tree;
use std::collections::HashMap;
use std::marker::PhantomData;

/// The parsed form of a whole pattern: one `NodeDescriptions` per
/// `;`-separated top-level alternative, plus the slot layout its names
/// were assigned.
pub struct ParsedPattern<T: Tree> {
    pub top_level: Vec<NodeDescriptions<T>>,
    pub slot_count: usize,
    pub name_slots: HashMap<String, BackRefSlot>,
}

pub fn parse<T: Tree>(tokens: Vec<Spanned>) -> Result<ParsedPattern<T>, CompileError> {
    let mut p = Parser {
        tokens,
        pos: 0,
        scope: Scope::new(),
        name_slots: HashMap::new(),
        next_slot: 0,
        _marker: PhantomData,
    };
    let mut top_level = vec![p.parse_named_nodes()?];
    while p.eat(Token::Semicolon) {
        if p.peek_is(&Token::Eof) {
            break;
        }
        top_level.push(p.parse_named_nodes()?);
    }
    p.expect(Token::Eof)?;
    Ok(ParsedPattern {
        top_level,
        slot_count: p.next_slot,
        name_slots: p.name_slots,
    })
}

/// Tracks whether parsing is currently beneath a `!` — no name may be
/// declared there, since a forbidden branch never commits bindings anyway
/// (see `crate::matcher::eval`'s doc comment).
///
/// A second naming invariant — a name may not be declared twice — is
/// enforced locally in `declare_name` instead of here: Tregex's well-known
/// "sibling relations share an anchor" reading (`A R1 B R2 C` attaches both
/// relations to `A`) means the *same* name legitimately gets declared
/// multiple times across sibling relation targets in one conjunction
/// (`foo=a <bar=a << baz=a` binds all three under `a`). The only
/// unambiguous duplicate is naming the exact same occurrence twice
/// (`X=a=a`), which `declare_name` catches by comparing slots.
struct Scope {
    negation_depth: usize,
}

impl Scope {
    fn new() -> Self {
        Scope { negation_depth: 0 }
    }

    fn under_negation(&self) -> bool {
        self.negation_depth > 0
    }

    fn enter_negation(&mut self) {
        self.negation_depth += 1;
    }

    fn exit_negation(&mut self) {
        self.negation_depth -= 1;
    }
}

struct Parser<T: Tree> {
    tokens: Vec<Spanned>,
    pos: usize,
    scope: Scope,
    name_slots: HashMap<String, BackRefSlot>,
    next_slot: usize,
    _marker: PhantomData<T>,
}

impl<T: Tree> Parser<T> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_is(&self, t: &Token) -> bool {
        self.peek() == t
    }

    fn peek_number(&self) -> Option<i64> {
        match self.peek() {
            Token::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn next_starts_relation(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|s| &s.token),
            Some(Token::Relation(_)) | Some(Token::RelWithStrArg(_))
        )
    }

    fn at_and_condition_start(&self) -> bool {
        matches!(
            self.peek(),
            Token::Relation(_)
                | Token::RelWithStrArg(_)
                | Token::Amp
                | Token::LParen
                | Token::LBracket
                | Token::Bang
                | Token::Question
                | Token::MultiRelation
        )
    }

    fn eat(&mut self, t: Token) -> bool {
        if self.peek() == &t {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Spanned {
        let s = self.tokens[self.pos].clone();
        if s.token != Token::Eof {
            self.pos += 1;
        }
        s
    }

    fn expect(&mut self, t: Token) -> Result<(), CompileError> {
        let s = self.tokens[self.pos].clone();
        if s.token == t {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: format!("{:?}", s.token),
                expected: format!("{:?}", t),
                offset: s.offset,
            }
            .into())
        }
    }

    fn expect_id(&mut self) -> Result<String, CompileError> {
        let s = self.advance();
        match s.token {
            Token::Id(id) => Ok(id),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "identifier".into(),
                offset: s.offset,
            }
            .into()),
        }
    }

    // named_nodes := node_descriptions
    //              | named_nodes and_or_conditions
    //              | named_nodes '=' ID
    //              | '=' ID
    //              | '(' named_nodes ')'
    fn parse_named_nodes(&mut self) -> Result<NodeDescriptions<T>, CompileError> {
        let mut nd = self.parse_named_nodes_primary()?;
        loop {
            if self.peek_is(&Token::Equals) {
                self.advance();
                let name = self.expect_id()?;
                self.declare_name(&mut nd, &name)?;
                continue;
            }
            if self.at_and_condition_start() {
                let cond = self.parse_and_condition()?;
                nd.condition = Some(Box::new(match nd.condition.take() {
                    None => cond,
                    Some(prev) => Cond::And(vec![*prev, cond]),
                }));
                continue;
            }
            break;
        }
        Ok(nd)
    }

    fn parse_named_nodes_primary(&mut self) -> Result<NodeDescriptions<T>, CompileError> {
        if self.peek_is(&Token::Equals) {
            self.advance();
            let name = self.expect_id()?;
            let slot = *self
                .name_slots
                .get(&name)
                .ok_or_else(|| ParseError::UndeclaredBackRef(name.clone()))?;
            if self.scope.under_negation() {
                return Err(ParseError::NameUnderNegation(name).into());
            }
            return Ok(NodeDescriptions {
                kind: DescriptionKind::BackRef(slot),
                under_negation: false,
                use_basic_cat: false,
                condition: None,
                declares: None,
                source: format!("={name}"),
            });
        }
        if self.eat(Token::LParen) {
            let inner = self.parse_named_nodes()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.parse_node_descriptions()
    }

    fn declare_name(&mut self, nd: &mut NodeDescriptions<T>, name: &str) -> Result<(), CompileError> {
        if self.scope.under_negation() {
            return Err(ParseError::NameUnderNegation(name.to_string()).into());
        }
        let next_slot = &mut self.next_slot;
        let slot = *self.name_slots.entry(name.to_string()).or_insert_with(|| {
            let s = BackRefSlot(*next_slot);
            *next_slot += 1;
            s
        });
        if nd.declares == Some(slot) {
            return Err(ParseError::DuplicateName(name.to_string()).into());
        }
        nd.declares = Some(slot);
        Ok(())
    }

    // node_descriptions := ['!'] ['@'] node_description ('|' node_description)*
    fn parse_node_descriptions(&mut self) -> Result<NodeDescriptions<T>, CompileError> {
        let under_negation = self.eat(Token::Bang);
        let use_basic_cat = self.eat(Token::At);
        let first = self.parse_node_description()?;
        let mut source = format!(
            "{}{}{}",
            if under_negation { "!" } else { "" },
            if use_basic_cat { "@" } else { "" },
            describe(&first)
        );
        let mut descs = vec![first];
        while self.eat(Token::OrNode) {
            let d = self.parse_node_description()?;
            source.push('|');
            source.push_str(&describe(&d));
            descs.push(d);
        }
        Ok(NodeDescriptions {
            kind: DescriptionKind::Literal(descs),
            under_negation,
            use_basic_cat,
            condition: None,
            declares: None,
            source,
        })
    }

    // node_description := ID | REGEX | BLANK | '(' node_description ')'
    fn parse_node_description(&mut self) -> Result<NodeDescription, CompileError> {
        if self.eat(Token::LParen) {
            let inner = self.parse_node_description()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        let s = self.advance();
        match s.token {
            Token::Id(id) if id == "ROOT" => Ok(NodeDescription::Root),
            Token::Id(id) => Ok(NodeDescription::Id(id)),
            Token::Blank => Ok(NodeDescription::Blank),
            Token::Regex(pat, flags) => Ok(NodeDescription::Regex(CompiledRegex::compile(&pat, &flags)?)),
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "node description".into(),
                offset: s.offset,
            }
            .into()),
        }
    }

    // and_condition := relation_data named_nodes
    //                | '&' and_condition
    //                | '(' and_conditions ')'
    //                | '[' or_conditions ']'
    //                | '!' and_conditions
    //                | '?' and_conditions
    //                | MULTI_RELATION '{' named_nodes (';' named_nodes)* '}'
    fn parse_and_condition(&mut self) -> Result<Cond<T>, CompileError> {
        if self.eat(Token::Amp) {
            return self.parse_and_condition();
        }
        if self.eat(Token::LParen) {
            let inner = self.parse_and_conditions_chain()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        if self.eat(Token::LBracket) {
            let inner = self.parse_or_conditions_body()?;
            self.expect(Token::RBracket)?;
            return Ok(inner);
        }
        if self.peek_is(&Token::Bang) && !self.next_starts_relation() {
            self.advance();
            self.scope.enter_negation();
            let inner = self.parse_not_opt_operand();
            self.scope.exit_negation();
            return Ok(Cond::Not(Box::new(inner?)));
        }
        if self.peek_is(&Token::Question) && !self.next_starts_relation() {
            self.advance();
            let inner = self.parse_not_opt_operand()?;
            return Ok(Cond::Opt(Box::new(inner)));
        }
        if self.eat(Token::MultiRelation) {
            return self.parse_multi_relation();
        }
        let rel = self.parse_relation_data()?;
        // A negated relation never actually binds its target (see
        // `crate::matcher::eval`), so naming one is rejected here too, not
        // just under an and_condition-level `!`.
        if rel.negated {
            self.scope.enter_negation();
        }
        let named = self.parse_relation_target();
        if rel.negated {
            self.scope.exit_negation();
        }
        Ok(Cond::Rel(rel, named?))
    }

    /// The `named_nodes` right of a `relation_data`. Parsed *without* the
    /// trailing and_condition loop that `parse_named_nodes` runs, so that a
    /// following relation reduces back onto the outer anchor instead of
    /// shifting into this target: `A R1 B R2 C` reads as `A R1 B` and `A R2 C`,
    /// both conjoined on `A` (the reduce-bias called for in the grammar),
    /// not as `A R1 (B R2 C)`. Explicit parens still force full grouping —
    /// `A R1 (B R2 C)` really does nest — and a bare `=ID` back-reference is
    /// unaffected either way.
    fn parse_relation_target(&mut self) -> Result<NodeDescriptions<T>, CompileError> {
        if self.peek_is(&Token::Equals) || self.peek_is(&Token::LParen) {
            return self.parse_named_nodes_primary();
        }
        let mut nd = self.parse_node_descriptions()?;
        while self.peek_is(&Token::Equals) {
            self.advance();
            let name = self.expect_id()?;
            self.declare_name(&mut nd, &name)?;
        }
        Ok(nd)
    }

    fn parse_not_opt_operand(&mut self) -> Result<Cond<T>, CompileError> {
        if self.eat(Token::LParen) {
            let inner = self.parse_and_conditions_chain()?;
            self.expect(Token::RParen)?;
            Ok(inner)
        } else if self.eat(Token::LBracket) {
            let inner = self.parse_or_conditions_body()?;
            self.expect(Token::RBracket)?;
            Ok(inner)
        } else {
            self.parse_and_conditions_chain()
        }
    }

    // and_conditions := and_condition+
    fn parse_and_conditions_chain(&mut self) -> Result<Cond<T>, CompileError> {
        let mut conds = vec![self.parse_and_condition()?];
        while self.at_and_condition_start() {
            conds.push(self.parse_and_condition()?);
        }
        Ok(if conds.len() == 1 {
            conds.pop().unwrap()
        } else {
            Cond::And(conds)
        })
    }

    // or_conditions := and_conditions ('||' and_conditions)+  |  '[' or_conditions ']'
    // (the bracket form is handled by the caller; this parses the body)
    fn parse_or_conditions_body(&mut self) -> Result<Cond<T>, CompileError> {
        let mut branches = vec![self.parse_and_conditions_chain()?];
        while self.eat(Token::OrRel) {
            branches.push(self.parse_and_conditions_chain()?);
        }
        Ok(if branches.len() == 1 {
            branches.pop().unwrap()
        } else {
            Cond::Or(branches)
        })
    }

    // relation_data := RELATION | RELATION NUMBER
    //                | REL_W_STR_ARG '(' named_nodes ')'
    //                | '!' relation_data | '?' relation_data
    fn parse_relation_data(&mut self) -> Result<RelDescriptor<T>, CompileError> {
        if self.eat(Token::Bang) {
            let inner = self.parse_relation_data()?;
            return Ok(inner.negate()?);
        }
        if self.eat(Token::Question) {
            let inner = self.parse_relation_data()?;
            return Ok(inner.make_optional()?);
        }
        let s = self.advance();
        match s.token {
            Token::Relation(lit) => self.build_plain_or_num_relation(&lit),
            Token::RelWithStrArg(lit) => {
                self.expect(Token::LParen)?;
                let arg = self.parse_named_nodes()?;
                self.expect(Token::RParen)?;
                let op = str_arg_op(&lit).ok_or_else(|| ParseError::UnknownRelation(lit.clone()))?;
                Ok(RelDescriptor::plain(RelOp::WithStrArg(op, Box::new(arg)), lit))
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "relation".into(),
                offset: s.offset,
            }
            .into()),
        }
    }

    fn build_plain_or_num_relation(&mut self, lit: &str) -> Result<RelDescriptor<T>, CompileError> {
        if let Some(op) = num_arg_op(lit) {
            if let Some(n) = self.peek_number() {
                self.advance();
                let k = if lit.ends_with('-') { -n } else { n };
                return Ok(RelDescriptor::plain(RelOp::WithNumArg(op, k), lit.to_string()));
            }
        }
        if lit == "<<<-" {
            let n = self
                .peek_number()
                .ok_or_else(|| ParseError::UnexpectedToken {
                    found: format!("{:?}", self.peek()),
                    expected: "number".into(),
                    offset: self.tokens[self.pos].offset,
                })?;
            self.advance();
            return Ok(RelDescriptor::plain(
                RelOp::WithNumArg(NumArgOp::AncestorOfIthLeaf, -n),
                lit.to_string(),
            ));
        }
        let op = plain_op(lit).ok_or_else(|| ParseError::UnknownRelation(lit.to_string()))?;
        Ok(RelDescriptor::plain(RelOp::Plain(op), lit.to_string()))
    }

    // MULTI_RELATION '{' named_nodes (';' named_nodes)* '}'
    //
    // Built as a conjunction of "has an i-th child satisfying named_nodes[i]"
    // for each listed child, plus a trailing negated check that there is no
    // (n+1)-th child — so the listed children are the node's *entire* child
    // sequence, not merely a subset of it.
    fn parse_multi_relation(&mut self) -> Result<Cond<T>, CompileError> {
        self.expect(Token::LBrace)?;
        let mut items = vec![self.parse_named_nodes()?];
        while self.eat(Token::Semicolon) {
            if self.peek_is(&Token::RBrace) {
                break;
            }
            items.push(self.parse_named_nodes()?);
        }
        self.expect(Token::RBrace)?;
        if items.is_empty() {
            return Err(SemanticError::EmptyMultiRelationBlock.into());
        }
        let mut conds = Vec::new();
        for (i, nd) in items.into_iter().enumerate() {
            let k = (i + 1) as i64;
            let rel = RelDescriptor::plain(
                RelOp::WithNumArg(NumArgOp::HasIthChild, k),
                format!("<...{{{k}}}"),
            );
            conds.push(Cond::Rel(rel, nd));
        }
        let n_plus_1 = conds.len() as i64 + 1;
        let blank = NodeDescriptions {
            kind: DescriptionKind::Literal(vec![NodeDescription::Blank]),
            under_negation: false,
            use_basic_cat: false,
            condition: None,
            declares: None,
            source: "__".into(),
        };
        let no_extra = RelDescriptor::plain(
            RelOp::WithNumArg(NumArgOp::HasIthChild, n_plus_1),
            "<...{n+1}".into(),
        )
        .negate()?;
        conds.push(Cond::Rel(no_extra, blank));
        Ok(Cond::And(conds))
    }
}

fn describe(d: &NodeDescription) -> String {
    match d {
        NodeDescription::Id(s) => s.clone(),
        NodeDescription::Regex(r) => r.source().to_string(),
        NodeDescription::Blank => "__".to_string(),
        NodeDescription::Root => "ROOT".to_string(),
    }
}

fn plain_op(lit: &str) -> Option<PlainOp> {
    use PlainOp::*;
    Some(match lit {
        "<" => ParentOf,
        ">" => ChildOf,
        "<<" => Dominates,
        ">>" => DominatedBy,
        "<:" => HasOnlyChild,
        ">:" => OnlyChildOf,
        "<," => FirstChildIs,
        ">," => IsFirstChildOf,
        "<-" | "<`" => LastChildIs,
        ">-" | ">`" => IsLastChildOf,
        "<<," => LeftmostDescendantIs,
        "<<-" | "<<`" => RightmostDescendantIs,
        ">>," => IsLeftmostDescendantOf,
        ">>-" | ">>`" => IsRightmostDescendantOf,
        "$" => SisterOf,
        "$.." | "$++" => LeftSisterOf,
        "$--" | "$,," => RightSisterOf,
        "$." | "$+" => ImmediateLeftSisterOf,
        "$-" | "$," => ImmediateRightSisterOf,
        ".." => Precedes,
        ",," => Follows,
        "." => ImmediatelyPrecedes,
        "," => ImmediatelyFollows,
        "==" => Equals,
        "<=" => ParentEquals,
        "<<:" => UnaryDominates,
        ">>:" => UnaryDominatedBy,
        "<#" => HeadChildIs,
        ">#" => IsHeadChildOf,
        "<<#" => HeadTerminalIs,
        ">>#" => IsHeadTerminalOf,
        "<<<" => AncestorOfLeaf,
        ":" => PatternSplitter,
        _ => return None,
    })
}

fn num_arg_op(lit: &str) -> Option<NumArgOp> {
    match lit {
        ">" | ">-" => Some(NumArgOp::IthChildOf),
        "<" | "<-" => Some(NumArgOp::HasIthChild),
        _ => None,
    }
}

fn str_arg_op(lit: &str) -> Option<StrArgOp> {
    use StrArgOp::*;
    Some(match lit {
        "<+" => UnbrokenCategoryDominates,
        ">+" => UnbrokenCategoryIsDominatedBy,
        ".+" => UnbrokenCategoryPrecedes,
        ",+" => UnbrokenCategoryFollows,
        _ => return None,
    })
}
