use thiserror::Error;

/// Failure tokenizing pattern source. Carries a byte offset for caret diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("illegal character {ch:?} at offset {offset}")]
pub struct TokenizeError {
    pub ch: char,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        offset: usize,
    },
    #[error("unexpected end of pattern, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("unknown relation `{0}`")]
    UnknownRelation(String),
    #[error("invalid regex flag `{0}`")]
    InvalidRegexFlag(char),
    #[error("invalid regex /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("name `{0}` declared twice in the same conjunction")]
    DuplicateName(String),
    #[error("name `{0}` cannot be declared under negation")]
    NameUnderNegation(String),
    #[error("back-reference to undeclared name `{0}`")]
    UndeclaredBackRef(String),
    #[error("relation cannot be both negated and optional")]
    NegatedAndOptionalConflict,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("empty multi-relation block")]
    EmptyMultiRelationBlock,
    #[error("zero-length string argument to relation `{0}`")]
    EmptyStringArg(String),
}

/// Top-level compile failure, wrapping whichever phase produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokenize_error_message_carries_offset() {
        let e = TokenizeError { ch: '%', offset: 7 };
        assert!(e.to_string().contains('7'));
    }

    #[test]
    fn compile_error_wraps_parse_error() {
        let e: CompileError = ParseError::UnknownRelation("~".into()).into();
        assert!(matches!(e, CompileError::Parse(_)));
    }
}
