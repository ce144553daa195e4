use regex::{NoExpand, Regex, RegexBuilder};

use super::{PatternError, PatternSpec, Syntax};
use crate::files::{join_name, split_name};

/// Compiled name pattern
///
/// `test` is a whole-subject match in every syntax; `replace` substitutes
/// every occurrence found anywhere in the subject. The subject is the stem
/// unless `include_suffix` is set.
#[derive(Debug, Clone)]
pub struct Matcher {
    exact: Regex,
    search: Regex,
    syntax: Syntax,
    include_suffix: bool,
}

impl Matcher {
    pub fn compile(spec: &PatternSpec) -> Result<Self, PatternError> {
        if spec.text.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let body = match spec.kind {
            Syntax::Wildcard => wildcard_to_regex(&spec.text),
            Syntax::FixedString => regex::escape(&spec.text),
            Syntax::Regex => spec.text.clone(),
        };

        let search = build(&body, &spec.text, spec.case_sensitive)?;
        let exact = build(&format!("^(?:{body})$"), &spec.text, spec.case_sensitive)?;

        Ok(Self {
            exact,
            search,
            syntax: spec.kind,
            include_suffix: spec.include_suffix,
        })
    }

    /// Whether `name` (a full file name) matches
    pub fn test(&self, name: &str) -> bool {
        if self.include_suffix {
            self.exact.is_match(name)
        } else {
            self.exact.is_match(split_name(name).0)
        }
    }

    /// Replace every match inside `name`, keeping the suffix out of reach
    /// unless it is part of the subject
    ///
    /// Regex replacements may reference capture groups (`$1`); other syntaxes
    /// insert the replacement literally.
    pub fn replace(&self, name: &str, replacement: &str) -> String {
        let (subject, suffix) = if self.include_suffix {
            (name, None)
        } else {
            split_name(name)
        };

        let replaced = match self.syntax {
            Syntax::Regex => self.search.replace_all(subject, replacement),
            Syntax::Wildcard | Syntax::FixedString => {
                self.search.replace_all(subject, NoExpand(replacement))
            }
        };

        join_name(&replaced, suffix)
    }
}

fn build(pattern: &str, original: &str, case_sensitive: bool) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| PatternError::InvalidPattern {
            pattern: original.to_string(),
            reason: e.to_string(),
        })
}

/// `*` -> any run of characters, `?` -> exactly one character
fn wildcard_to_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    out.push_str("(?s)");
    let mut literal = [0u8; 4];
    for ch in text.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(ch.encode_utf8(&mut literal))),
        }
    }
    out
}
