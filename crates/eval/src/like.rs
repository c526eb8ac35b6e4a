//! Like pattern compilation.
//!
//! A pattern is validated explicitly before translation: empty or
//! clashing wildcard/escape tokens, over-long patterns and patterns with
//! too many multi-character wildcards are rejected up front. The
//! translated regular expression is then built with a size ceiling, so a
//! pattern can never compile into an automaton that grows out of
//! proportion to its input.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::LikeLimits;
use crate::error::{FilterError, Result};

/// A validated, compiled Like pattern.
#[derive(Clone)]
pub struct LikePattern {
    pattern: String,
    wildcard_multi: String,
    wildcard_single: String,
    escape: String,
    match_case: bool,
    matcher: Arc<Regex>,
}

enum Token<'a> {
    Multi,
    Single,
    Literal(&'a str),
}

impl LikePattern {
    pub fn new(
        pattern: impl Into<String>,
        wildcard_multi: impl Into<String>,
        wildcard_single: impl Into<String>,
        escape: impl Into<String>,
        match_case: bool,
        limits: &LikeLimits,
    ) -> Result<LikePattern> {
        let pattern = pattern.into();
        let wildcard_multi = wildcard_multi.into();
        let wildcard_single = wildcard_single.into();
        let escape = escape.into();

        validate(&pattern, &wildcard_multi, &wildcard_single, &escape, limits).map_err(|e| {
            debug!(pattern = %pattern, error = %e, "rejected like pattern");
            e
        })?;

        let source = translate(&pattern, &wildcard_multi, &wildcard_single, &escape);
        let matcher = RegexBuilder::new(&source)
            .case_insensitive(!match_case)
            .dot_matches_new_line(true)
            .size_limit(limits.regex_size_limit)
            .build()
            .map_err(|e| {
                debug!(pattern = %pattern, error = %e, "like pattern exceeds automaton limits");
                FilterError::argument(format!("like pattern '{}' cannot be compiled: {}", pattern, e))
            })?;

        Ok(LikePattern {
            pattern,
            wildcard_multi,
            wildcard_single,
            escape,
            match_case,
            matcher: Arc::new(matcher),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn wildcard_multi(&self) -> &str {
        &self.wildcard_multi
    }

    pub fn wildcard_single(&self) -> &str {
        &self.wildcard_single
    }

    pub fn escape(&self) -> &str {
        &self.escape
    }

    pub fn match_case(&self) -> bool {
        self.match_case
    }

    /// The regular expression the pattern was translated into.
    pub fn regex_source(&self) -> &str {
        self.matcher.as_str()
    }

    /// Rewrite as an SQL92 LIKE pattern (`%`, `_`, backslash escape).
    pub fn to_sql92(&self) -> String {
        let mut out = String::with_capacity(self.pattern.len());
        for token in tokens(&self.pattern, &self.wildcard_multi, &self.wildcard_single, &self.escape) {
            match token {
                Token::Multi => out.push('%'),
                Token::Single => out.push('_'),
                Token::Literal(s) => {
                    for c in s.chars() {
                        if matches!(c, '%' | '_' | '\\') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                }
            }
        }
        out
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.wildcard_multi == other.wildcard_multi
            && self.wildcard_single == other.wildcard_single
            && self.escape == other.escape
            && self.match_case == other.match_case
    }
}

impl fmt::Debug for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LikePattern")
            .field("pattern", &self.pattern)
            .field("wildcard_multi", &self.wildcard_multi)
            .field("wildcard_single", &self.wildcard_single)
            .field("escape", &self.escape)
            .field("match_case", &self.match_case)
            .finish()
    }
}

fn validate(
    pattern: &str,
    multi: &str,
    single: &str,
    escape: &str,
    limits: &LikeLimits,
) -> Result<()> {
    for (label, token) in [("wildcard", multi), ("single-character wildcard", single), ("escape", escape)] {
        if token.is_empty() {
            return Err(FilterError::argument(format!("like {} must not be empty", label)));
        }
    }
    if multi == single || multi == escape || single == escape {
        return Err(FilterError::argument(format!(
            "like wildcard '{}', single '{}' and escape '{}' must be distinct",
            multi, single, escape
        )));
    }
    let len = pattern.chars().count();
    if len > limits.max_pattern_len {
        return Err(FilterError::argument(format!(
            "like pattern is {} characters, limit is {}",
            len, limits.max_pattern_len
        )));
    }
    let wildcards = tokens(pattern, multi, single, escape)
        .filter(|t| matches!(t, Token::Multi))
        .count();
    if wildcards > limits.max_wildcards {
        return Err(FilterError::argument(format!(
            "like pattern has {} wildcards, limit is {}",
            wildcards, limits.max_wildcards
        )));
    }
    Ok(())
}

/// Split a pattern into wildcards and literal runs. An escape makes the
/// next character literal; a trailing escape is dropped.
fn tokens<'a>(
    pattern: &'a str,
    multi: &'a str,
    single: &'a str,
    escape: &'a str,
) -> impl Iterator<Item = Token<'a>> + 'a {
    let mut rest = pattern;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        if let Some(after) = rest.strip_prefix(escape) {
            let c = after.chars().next()?;
            let (literal, tail) = after.split_at(c.len_utf8());
            rest = tail;
            return Some(Token::Literal(literal));
        }
        if let Some(after) = rest.strip_prefix(multi) {
            rest = after;
            return Some(Token::Multi);
        }
        if let Some(after) = rest.strip_prefix(single) {
            rest = after;
            return Some(Token::Single);
        }
        let c = rest.chars().next()?;
        let (literal, tail) = rest.split_at(c.len_utf8());
        rest = tail;
        Some(Token::Literal(literal))
    })
}

fn translate(pattern: &str, multi: &str, single: &str, escape: &str) -> String {
    let mut out = String::from("^");
    let mut last_multi = false;
    for token in tokens(pattern, multi, single, escape) {
        match token {
            // Adjacent multi wildcards collapse into one.
            Token::Multi if last_multi => continue,
            Token::Multi => {
                out.push_str(".*");
                last_multi = true;
                continue;
            }
            Token::Single => out.push('.'),
            Token::Literal(s) => out.push_str(&regex::escape(s)),
        }
        last_multi = false;
    }
    out.push('$');
    out
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
