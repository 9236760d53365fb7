//! Left-to-right scanner for variable references embedded in free-form expressions.
//!
//! A reference is a known variable token, optionally followed by `<sep>feature` and/or a
//! bracketed index, in the order given by the base collection template. Index contents are
//! themselves expressions and are scanned recursively.
//!
//! Tokens are maximal alphanumeric runs, so `xMuon` never matches `Muon`. A variable that is
//! the prefix (up to the separator) of an unrelated identifier does match, e.g. `Muon_like`
//! reads as feature `like` of `Muon`.

use super::dictionary::NameTranslator;
use super::error::TranslateError;
use super::types::Side;
use tracing::warn;

/// Bracketed index following a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexField<'s> {
    Absent,
    /// `[]`: consumed, the reference is read without an index.
    Empty,
    Expr(&'s str),
}

/// A reference parsed at the head of a string.
struct Reference<'s> {
    var: &'s str,
    feature: Option<&'s str>,
    index: Option<&'s str>,
    /// Bytes consumed from the start of the variable token.
    len: usize,
}

/// First alphanumeric run (plus `_` when allowed) and the byte offset where it starts.
/// Returns an empty token at the end of the string when there is none.
fn get_token(s: &str, underscore_allowed: bool) -> (&str, usize) {
    let is_token = |c: char| c.is_alphanumeric() || (underscore_allowed && c == '_');
    let Some(start) = s.find(is_token) else {
        return ("", s.len());
    };
    let end = s[start..].find(|c: char| !is_token(c)).map_or(s.len(), |e| start + e);
    (&s[start..end], start)
}

/// Byte position of the `]` closing an already opened bracket.
fn find_closing_bracket(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

impl NameTranslator {
    /// First token naming a known variable, and its byte offset.
    fn find_first_var<'s>(&self, s: &'s str) -> Option<(&'s str, usize)> {
        let mut shift = 0;
        while shift < s.len() {
            let (token, at) = get_token(&s[shift..], false);
            if !token.is_empty() && self.is_defined(token) {
                return Some((token, shift + at));
            }
            shift += at + token.len();
        }
        None
    }

    /// Feature written right at the head of `s`, as `<sep>name`. A name followed by `(` is a
    /// method call, not a feature.
    fn find_feature<'s>(&self, s: &'s str) -> Option<&'s str> {
        let separator = self.separator(Side::Base);
        if separator.is_empty() || s.len() <= separator.len() || !s.starts_with(separator) {
            return None;
        }
        let rest = &s[separator.len()..];
        let (token, at) = get_token(rest, true);
        if at != 0 {
            warn!(expression = s, "malformed feature field");
            return None;
        }
        if token.is_empty() || rest[token.len()..].starts_with('(') {
            return None;
        }
        Some(token)
    }

    fn find_index<'s>(&self, s: &'s str) -> IndexField<'s> {
        if !s.starts_with('[') {
            return IndexField::Absent;
        }
        match find_closing_bracket(&s[1..]) {
            Some(0) => IndexField::Empty,
            Some(end) => IndexField::Expr(&s[1..1 + end]),
            None => IndexField::Absent,
        }
    }

    /// Parses the feature/index suffixes of `var`, which sits at the head of `s`.
    fn read_reference<'s>(&self, s: &'s str, var: &'s str) -> Reference<'s> {
        let separator_len = self.separator(Side::Base).len();
        let mut r = Reference { var, feature: None, index: None, len: var.len() };

        let read_feature = |r: &mut Reference<'s>| {
            if let Some(f) = self.find_feature(&s[r.len..]) {
                r.len += separator_len + f.len();
                r.feature = Some(f);
            }
        };
        if self.feature_first() {
            read_feature(&mut r);
        }
        match self.find_index(&s[r.len..]) {
            IndexField::Absent => {}
            IndexField::Empty => r.len += 2,
            IndexField::Expr(e) => {
                r.len += e.len() + 2;
                r.index = Some(e);
            }
        }
        if !self.feature_first() {
            read_feature(&mut r);
        }
        r
    }

    /// Rewrites every reference in `expr` into the target convention.
    pub fn translate(&self, expr: &str) -> Result<String, TranslateError> {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;
        while let Some((var, at)) = self.find_first_var(rest) {
            out.push_str(&rest[..at]);
            let r = self.read_reference(&rest[at..], var);
            let index = match r.index {
                Some(e) => Some(self.translate(e)?),
                None => None,
            };
            out.push_str(&self.convert(r.var, r.feature, index.as_deref())?);
            rest = &rest[at + r.len..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Ordered, duplicate-free list of base-format references in `expr`, indices excluded.
    /// References inside an index follow the reference they index.
    pub fn extract_variables(&self, expr: &str) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_variables(expr, &mut found);
        let mut seen = std::collections::HashSet::new();
        found.retain(|v| seen.insert(v.clone()));
        found
    }

    fn collect_variables(&self, expr: &str, found: &mut Vec<String>) {
        let mut rest = expr;
        while let Some((var, at)) = self.find_first_var(rest) {
            let r = self.read_reference(&rest[at..], var);
            if let Some(feature) = r.feature {
                if !self.has_feature(var, feature) {
                    warn!(variable = var, feature, "feature not in the dictionary");
                }
            }
            found.push(self.build_base(r.var, r.feature, None));
            if let Some(e) = r.index {
                self.collect_variables(e, found);
            }
            rest = &rest[at + r.len..];
        }
    }
}
