//! Rule parsing and matching - hot path for every routing decision.
//!
//! A rule is `["METHOD "] segment ("/" segment)*` where a segment is a literal,
//! `$Name`, `$Name!` (required), or - as the final segment only - `$*` (capture the
//! remainder as parsed segments) or `$@` (capture the remainder as `$1`, `$2`, ...).
//! One `//` marks the shift boundary: only the segments before it are consumed
//! on success, the rest are parsed but left on the path.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use super::params::Bindings;
use crate::error::ConfigError;
use crate::registry::RoutableNames;
use crate::request::HttpRequest;

static METHOD_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+) +(.*)$").expect("static method regex"));

/// Variable name that must resolve to a registered routable handler.
pub const CONTROLLER_VAR: &str = "Controller";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Variable { name: Arc<str>, required: bool },
    /// `$*`
    Rest,
    /// `$@`
    Numbered,
}

/// Result of matching one rule against a request.
///
/// `MatchedEmpty` is distinct from `NoMatch`: a literal-only rule matches
/// without binding anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    MatchedEmpty,
    Matched(Bindings),
}

impl MatchOutcome {
    #[must_use]
    pub fn is_match(&self) -> bool {
        !matches!(self, MatchOutcome::NoMatch)
    }

    /// Bindings of a successful match (empty for `MatchedEmpty`)
    #[must_use]
    pub fn into_bindings(self) -> Option<Bindings> {
        match self {
            MatchOutcome::NoMatch => None,
            MatchOutcome::MatchedEmpty => Some(Bindings::new()),
            MatchOutcome::Matched(b) => Some(b),
        }
    }
}

/// A parsed URL rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    source: String,
    method: Option<Method>,
    tokens: Vec<Token>,
    shift_count: usize,
}

impl Rule {
    /// Parse a rule string, rejecting malformed patterns up front.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            rule: pattern.to_string(),
            reason: reason.to_string(),
        };

        let (method, body) = match METHOD_PREFIX_RE.captures(pattern) {
            Some(caps) => {
                let verb = caps[1].to_ascii_uppercase();
                let method =
                    Method::from_bytes(verb.as_bytes()).map_err(|_| invalid("unknown HTTP method"))?;
                (Some(method), caps[2].to_string())
            }
            None => (None, pattern.to_string()),
        };
        let body = body.trim();

        if body.is_empty() || body == "/" {
            return Ok(Self {
                source: pattern.to_string(),
                method,
                tokens: Vec::new(),
                shift_count: 0,
            });
        }

        let (before, after) = match body.find("//") {
            Some(idx) => {
                let rest = &body[idx + 2..];
                if rest.contains("//") {
                    return Err(invalid("more than one '//' shift marker"));
                }
                (&body[..idx], Some(rest))
            }
            None => (body, None),
        };

        let head = split_tokens(before);
        let tail = after.map(split_tokens).unwrap_or_default();
        let mut shift_count = if after.is_some() {
            head.len()
        } else {
            head.len() + tail.len()
        };

        let raw: Vec<&str> = head.into_iter().chain(tail).collect();
        let mut tokens = Vec::with_capacity(raw.len());
        for (i, part) in raw.iter().enumerate() {
            let token = parse_token(part).map_err(|reason| invalid(&reason))?;
            if matches!(token, Token::Rest | Token::Numbered) {
                if i + 1 != raw.len() {
                    return Err(invalid("wildcard must be the final segment"));
                }
                shift_count = i;
            }
            tokens.push(token);
        }

        Ok(Self {
            source: pattern.to_string(),
            method,
            tokens,
            shift_count,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Segments consumed on a successful shifting match
    #[must_use]
    pub fn shift_count(&self) -> usize {
        self.shift_count
    }

    /// An empty (root) pattern can never consume a segment.
    #[must_use]
    pub fn is_empty_pattern(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Match this rule against the remaining path of `req`.
    ///
    /// On success the latest bindings are replaced, the cumulative bindings are
    /// merged (never blanking a populated value) and, when `shift` is set, the
    /// consumed segments are removed from the path. A mismatch leaves the request
    /// untouched.
    pub fn matches(
        &self,
        req: &mut HttpRequest,
        shift: bool,
        routable: &dyn RoutableNames,
    ) -> MatchOutcome {
        if let Some(required) = &self.method {
            if required != req.method() {
                return MatchOutcome::NoMatch;
            }
        }

        if self.tokens.is_empty() {
            return if req.dir_parts_len() == 0 {
                MatchOutcome::MatchedEmpty
            } else {
                MatchOutcome::NoMatch
            };
        }

        let segment_count = req.dir_parts_len();
        let mut bindings = Bindings::new();
        let mut parsed = self.tokens.len();

        for (i, token) in self.tokens.iter().enumerate() {
            match token {
                Token::Variable { name, required } => {
                    let value = req.dir_part(i).map(str::to_string);
                    if *required && value.is_none() {
                        return MatchOutcome::NoMatch;
                    }
                    if name.as_ref() == CONTROLLER_VAR
                        && !value.as_deref().is_some_and(|v| routable.is_routable(v))
                    {
                        trace!(rule = %self.source, value = ?value, "Controller variable is not routable");
                        return MatchOutcome::NoMatch;
                    }
                    bindings.set(Arc::clone(name), value);
                }
                Token::Rest => {
                    parsed = i + segment_count.saturating_sub(i);
                    break;
                }
                Token::Numbered => {
                    let remaining = segment_count.saturating_sub(i);
                    for j in 1..=remaining {
                        let value = req.dir_part(i + j - 1).map(str::to_string);
                        bindings.set(format!("${j}"), value);
                    }
                    parsed = i + remaining;
                    break;
                }
                Token::Literal(literal) => {
                    let Some(segment) = req.dir_part(i) else {
                        return MatchOutcome::NoMatch;
                    };
                    if segment == literal {
                        continue;
                    }
                    let is_last = i + 1 == segment_count;
                    let with_extension = req
                        .extension()
                        .is_some_and(|ext| is_last && literal == &format!("{segment}.{ext}"));
                    if !with_extension {
                        return MatchOutcome::NoMatch;
                    }
                }
            }
        }

        if shift {
            req.shift(self.shift_count);
            req.set_unshifted_but_parsed(parsed.saturating_sub(self.shift_count));
        }
        req.record_match(&bindings);

        if bindings.is_empty() {
            MatchOutcome::MatchedEmpty
        } else {
            MatchOutcome::Matched(bindings)
        }
    }
}

impl FromStr for Rule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::parse(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_tokens(part: &str) -> Vec<&str> {
    part.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_token(part: &str) -> Result<Token, String> {
    let Some(var) = part.strip_prefix('$') else {
        return Ok(Token::Literal(part.to_string()));
    };
    match var {
        "*" => Ok(Token::Rest),
        "@" => Ok(Token::Numbered),
        "" | "!" => Err(format!("empty variable name in '{part}'")),
        _ => {
            let (name, required) = match var.strip_suffix('!') {
                Some(name) => (name, true),
                None => (var, false),
            };
            Ok(Token::Variable {
                name: Arc::from(name),
                required,
            })
        }
    }
}
