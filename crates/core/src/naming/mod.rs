//! Name classification and sanitizing.
//!
//! A name is "meaningful" unless it is empty or carries one of the backend's
//! own placeholder prefixes (`sub_`, `loc_`, `flt_`, `off_`, `unk_`, `byte_`,
//! `word_`, `dword_`). Names produced by this crate carry a marker prefix
//! (`z_` by default); the marker is stripped before a name is reused so that
//! propagation never stacks `z_z_...`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default marker applied to every inferred name.
pub const DEFAULT_PREFIX: &str = "z_";

/// Default upper bound for names derived from string literals.
pub const DEFAULT_MAX_NAME_LEN: usize = 256;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(sub|loc|flt|off|unk|byte|word|dword)_").expect("valid regex")
});

/// printf-style directive: flags, width/precision, length modifier, conversion.
static FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%[-+ #0]*[0-9.]*[lhLzjt]{0,2}[diufFeEgGxXoscpaAn]").expect("valid regex")
});

static NON_IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid regex"));

static UNDERSCORES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

static DEFAULT_RULES: Lazy<NamingRules> =
    Lazy::new(|| NamingRules::new(DEFAULT_PREFIX).expect("valid default prefix"));

/// True iff `name` is non-empty and not a backend placeholder.
pub fn is_named(name: &str) -> bool {
    !name.is_empty() && !PLACEHOLDER_RE.is_match(name)
}

/// Turn arbitrary literal text into an identifier.
///
/// Output matches `[A-Za-z0-9_]*` with no leading, trailing or doubled `_`.
/// Applying it twice yields the same result.
pub fn sanitize(text: &str) -> String {
    let text = text.trim();
    let text = FORMAT_RE.replace_all(text, "_");
    let text = NON_IDENT_RE.replace_all(&text, "_");
    let text = UNDERSCORES_RE.replace_all(&text, "_");
    text.trim_matches('_').to_string()
}

/// Marker-aware naming rules for a configured prefix.
#[derive(Debug, Clone)]
pub struct NamingRules {
    prefix: String,
    marker: Regex,
}

impl NamingRules {
    /// Build rules for `prefix`. A marker is the literal prefix, or the
    /// prefix's first character, optionally one more character, then `_`.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let tag = prefix.chars().next().map(|c| c.to_string()).unwrap_or_default();
        let marker = Regex::new(&format!(
            "^(?:{}|{}.?_)",
            regex::escape(prefix),
            regex::escape(&tag)
        ))?;
        Ok(Self { prefix: prefix.to_string(), marker })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True when `name` looks like one of our own inferred names.
    pub fn has_marker(&self, name: &str) -> bool {
        self.marker.is_match(name)
    }

    /// Remove a previously applied marker, if any.
    pub fn strip_existing_prefix<'n>(&self, name: &'n str) -> &'n str {
        match self.marker.find(name) {
            Some(m) => &name[m.end()..],
            None => name,
        }
    }

    /// Name inferred from an already-named neighbour.
    pub fn propagated_name(&self, source: &str) -> String {
        format!("{}{}", self.prefix, self.strip_existing_prefix(source))
    }

    /// Name derived from a string literal, or `None` when nothing survives
    /// sanitizing. The result is cut to `max_len` bytes.
    pub fn anchor_name(&self, text: &str, max_len: usize) -> Option<String> {
        let body = sanitize(text);
        if body.is_empty() {
            return None;
        }
        let mut name = format!("{}{}", self.prefix, body);
        // sanitized text is ASCII, but the prefix may not be
        while name.len() > max_len {
            name.pop();
        }
        Some(name)
    }

    /// Functions eligible for a string anchor: placeholder or marker names.
    pub fn accepts_anchor(&self, name: &str) -> bool {
        !is_named(name) || self.has_marker(name)
    }
}

impl Default for NamingRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}
