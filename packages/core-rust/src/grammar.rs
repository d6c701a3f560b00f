//! Security grammars for mapping keys and values.
//!
//! Every string that reaches SQL construction must have passed one of these
//! checks at document load time. The character classes exclude quotes,
//! semicolons, and dashes, so quoted literals, statement separators, and
//! `--` comments cannot be smuggled in through configuration.

use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical paths: dotted identifiers independent of any backend schema.
static CANONICAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.]+$").unwrap()
});

/// Entity sources: physical table/view names, optionally bracket-quoted.
static SOURCE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\[\]]+$").unwrap()
});

/// Backend expressions: column references or simple SQL fragments. Adds
/// `@`, `,`, parentheses, and spaces over the source grammar for calls like
/// `COALESCE(Email, AltEmail)`.
static BACKEND_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\[\]@,() ]+$").unwrap()
});

#[must_use]
pub fn is_canonical_key(value: &str) -> bool {
    CANONICAL_KEY.is_match(value)
}

#[must_use]
pub fn is_source_identifier(value: &str) -> bool {
    SOURCE_IDENTIFIER.is_match(value)
}

#[must_use]
pub fn is_backend_expression(value: &str) -> bool {
    BACKEND_EXPRESSION.is_match(value)
}
