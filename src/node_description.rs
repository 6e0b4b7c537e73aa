use crate::error::ParseError;
use regex::Regex;

/// A single node-label predicate: `ID`, `REGEX`, `BLANK`, or `ROOT`.
#[derive(Debug, Clone)]
pub enum NodeDescription {
    Id(String),
    Regex(CompiledRegex),
    Blank,
    Root,
}

/// A `/pattern/flags` description compiled once at parse time.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    source: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Only `i` (case-insensitive) and `x` (verbose) flags are accepted;
    /// any other trailing flag is a compile-time error.
    pub fn compile(pattern: &str, flags: &str) -> Result<Self, ParseError> {
        let mut case_insensitive = false;
        let mut verbose = false;
        for f in flags.chars() {
            match f {
                'i' => case_insensitive = true,
                'x' => verbose = true,
                other => return Err(ParseError::InvalidRegexFlag(other)),
            }
        }
        let mut inline = String::new();
        if case_insensitive || verbose {
            inline.push_str("(?");
            if case_insensitive {
                inline.push('i');
            }
            if verbose {
                inline.push('x');
            }
            inline.push(')');
        }
        inline.push_str(pattern);
        let regex = Regex::new(&inline).map_err(|e| ParseError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(CompiledRegex {
            source: format!("/{pattern}/{flags}"),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl NodeDescription {
    /// `attr` is the node's label or basic_category, depending on the
    /// enclosing `NodeDescriptions`' `use_basic_cat` flag. `is_root` is
    /// whether the node's parent is absent.
    pub fn test(&self, attr: Option<&str>, is_root: bool) -> bool {
        match self {
            NodeDescription::Id(s) => attr == Some(s.as_str()),
            NodeDescription::Regex(re) => attr.map(|a| re.is_match(a)).unwrap_or(false),
            NodeDescription::Blank => true,
            NodeDescription::Root => is_root,
        }
    }
}
