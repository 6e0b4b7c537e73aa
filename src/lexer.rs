use crate::error::TokenizeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Relation(String),
    RelWithStrArg(String),
    MultiRelation,
    Blank,
    /// Raw pattern text and flag letters, not yet compiled.
    Regex(String, String),
    OrNode,
    OrRel,
    Number(i64),
    Id(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Bang,
    Question,
    At,
    Amp,
    Equals,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Relation literals, longest-first so that greedy scanning never splits
/// `>>` into two `>` tokens or mistakes `>+` for `>` followed by `+`.
const RELATIONS: &[&str] = &[
    "<<<-", "<...", "<<<", "<<,", "<<-", "<<:", "<<#", ">>,", ">>-", ">>:", ">>#", "$..", "$++",
    "$--", "$,,", "<<`", ">>`", "<<", ">>", "<:", ">:", "<,", ">,", "<-", ">-", "<`", ">`", "<=",
    "==", "$.", "$+", "$-", "$,", "..", ",,", "<#", ">#", "<+", ">+", ".+", ",+", "<", ">", "$",
    ".", ",", ":",
];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || "!?()[]{}@&=;|<>$.,/:".contains(c)
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, TokenizeError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.token == Token::Eof;
            out.push(tok);
            if done {
                break;
            }
        }
        Ok(out)
    }

    fn rest(&self) -> &[char] {
        &self.chars[self.pos..]
    }

    fn starts_with(&self, lit: &str) -> bool {
        let lit_chars: Vec<char> = lit.chars().collect();
        let rest = self.rest();
        rest.len() >= lit_chars.len() && rest[..lit_chars.len()] == lit_chars[..]
    }

    fn next_token(&mut self) -> Result<Spanned, TokenizeError> {
        self.skip_whitespace();
        let offset = self.pos;
        if self.pos >= self.chars.len() {
            return Ok(Spanned { token: Token::Eof, offset });
        }

        if self.starts_with("||") {
            self.pos += 2;
            return Ok(Spanned { token: Token::OrRel, offset });
        }
        if self.starts_with("__") && self.followed_by_delimiter_or_eof(2) {
            self.pos += 2;
            return Ok(Spanned { token: Token::Blank, offset });
        }
        if self.chars[self.pos] == '/' {
            return self.lex_regex(offset);
        }

        for lit in RELATIONS {
            if self.starts_with(lit) {
                self.pos += lit.chars().count();
                let token = if *lit == "<..." {
                    Token::MultiRelation
                } else if matches!(*lit, "<+" | ">+" | ".+" | ",+") {
                    Token::RelWithStrArg(lit.to_string())
                } else {
                    Token::Relation(lit.to_string())
                };
                return Ok(Spanned { token, offset });
            }
        }

        let c = self.chars[self.pos];
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '!' => Some(Token::Bang),
            '?' => Some(Token::Question),
            '@' => Some(Token::At),
            '&' => Some(Token::Amp),
            '=' => Some(Token::Equals),
            ';' => Some(Token::Semicolon),
            '|' => Some(Token::OrNode),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(Spanned { token, offset });
        }

        if c.is_ascii_digit() {
            return Ok(Spanned {
                token: self.lex_number(),
                offset,
            });
        }

        if !is_delimiter(c) {
            return Ok(Spanned {
                token: self.lex_id(),
                offset,
            });
        }

        Err(TokenizeError { ch: c, offset })
    }

    fn followed_by_delimiter_or_eof(&self, skip: usize) -> bool {
        self.chars
            .get(self.pos + skip)
            .map(|c| is_delimiter(*c))
            .unwrap_or(true)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn lex_number(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        Token::Number(s.parse().expect("digit run parses as i64"))
    }

    fn lex_id(&mut self) -> Token {
        let start = self.pos;
        while self.pos < self.chars.len() && !is_delimiter(self.chars[self.pos]) {
            self.pos += 1;
        }
        let s: String = self.chars[start..self.pos].iter().collect();
        Token::Id(s)
    }

    fn lex_regex(&mut self, offset: usize) -> Result<Spanned, TokenizeError> {
        self.pos += 1; // opening '/'
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '/' {
            self.pos += 1;
        }
        if self.pos >= self.chars.len() {
            return Err(TokenizeError { ch: '/', offset });
        }
        let pattern: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1; // closing '/'
        let flag_start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_alphabetic() {
            self.pos += 1;
        }
        let flags: String = self.chars[flag_start..self.pos].iter().collect();
        let _ = self.src;
        Ok(Spanned {
            token: Token::Regex(pattern, flags),
            offset,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_double_char_relations_greedily() {
        assert_eq!(toks(">>"), vec![Token::Relation(">>".into()), Token::Eof]);
    }

    #[test]
    fn distinguishes_str_arg_relation_from_plain_plus() {
        assert_eq!(
            toks("<+"),
            vec![Token::RelWithStrArg("<+".into()), Token::Eof]
        );
    }

    #[test]
    fn multi_relation_is_its_own_token() {
        assert_eq!(toks("<..."), vec![Token::MultiRelation, Token::Eof]);
    }

    #[test]
    fn blank_is_distinct_from_id() {
        assert_eq!(toks("__"), vec![Token::Blank, Token::Eof]);
        assert_eq!(toks("__foo"), vec![Token::Id("__foo".into()), Token::Eof]);
    }

    #[test]
    fn regex_captures_pattern_and_flags() {
        assert_eq!(
            toks("/^NP/ix"),
            vec![Token::Regex("^NP".into(), "ix".into()), Token::Eof]
        );
    }

    #[test]
    fn or_rel_before_or_node() {
        assert_eq!(toks("||"), vec![Token::OrRel, Token::Eof]);
        assert_eq!(toks("|"), vec![Token::OrNode, Token::Eof]);
    }

    #[test]
    fn identifiers_stop_at_delimiters() {
        assert_eq!(toks("NP-SBJ"), vec![Token::Id("NP-SBJ".into()), Token::Eof]);
        assert_eq!(
            toks("foo=a"),
            vec![Token::Id("foo".into()), Token::Equals, Token::Id("a".into()), Token::Eof]
        );
    }

    #[test]
    fn illegal_character_reports_offset() {
        let err = Lexer::new("foo%bar").tokenize().unwrap_err();
        assert_eq!(err, TokenizeError { ch: '%', offset: 3 });
    }

    #[test]
    fn whole_scenario_pattern_tokenizes() {
        let src = "foo=a <bar=a << baz=a";
        let tokens = toks(src);
        assert!(tokens.contains(&Token::Relation("<".into())));
        assert!(tokens.contains(&Token::Relation("<<".into())));
    }
}
