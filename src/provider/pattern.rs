//! URL recognizers and rewrite rules.
//!
//! A provider's table is an ordered list of [`ProviderPattern`]s; the first pattern whose
//! regex matches the trimmed input wins, so the most specific shapes come first.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use url::form_urlencoded;

/// `{name}` placeholders inside rewrite templates.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Name of the capture group holding the original query string.
pub const QUERY_GROUP: &str = "query";

/// Suffix matching an optional trailing slash, query string and fragment.
const TAIL: &str = r"/?(?:\?(?P<query>[^#]*))?(?:#.*)?$";

/// The URL shapes a provider can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Already the canonical API collection form.
    ApiCollection,
    /// Already the canonical API search form.
    ApiSearch,
    /// Another user's favorites / public collection.
    UserFavorites,
    /// The configured account's own favorites.
    OwnFavorites,
    /// A web collection page.
    Collection,
    /// A web listing page that maps onto a sorted search (toplist, latest, ...).
    Listing,
    /// A web search page.
    Search,
}

/// How a matched URL becomes a canonical API URL.
#[derive(Debug, Clone)]
pub enum Rewrite {
    /// The input already is the canonical form.
    PassThrough,
    /// Substitute `{name}` placeholders from captures (or context variables) into the
    /// template, then append the original query string.
    ///
    /// Placeholders in the template's query part are percent-decoded and re-encoded as
    /// form values, so a path segment like `cats&dogs` stays one search term.
    Template(String),
}

/// Why a rewrite could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// A placeholder had no capture and no context variable.
    MissingVariable(String),
}

/// One recognizer: a match rule plus the rewrite rule it feeds.
#[derive(Debug, Clone)]
pub struct ProviderPattern {
    kind: PatternKind,
    matcher: Regex,
    rewrite: Rewrite,
}

impl ProviderPattern {
    /// Builds a pattern from an origin regex and the path part of the shape.
    ///
    /// `path` is appended to `origin` and followed by the shared tail that accepts an
    /// optional trailing slash, query string and fragment.
    pub fn new(kind: PatternKind, origin: &str, path: &str, rewrite: Rewrite) -> Self {
        let source = format!("^{origin}{path}{TAIL}");
        let matcher = Regex::new(&source)
            .unwrap_or_else(|e| panic!("invalid built-in pattern {source}: {e}"));
        Self {
            kind,
            matcher,
            rewrite,
        }
    }

    /// Pattern whose input is already canonical.
    pub fn pass_through(kind: PatternKind, origin: &str, path: &str) -> Self {
        Self::new(kind, origin, path, Rewrite::PassThrough)
    }

    /// Pattern rewritten through `template`, appending the original query string.
    pub fn template(kind: PatternKind, origin: &str, path: &str, template: String) -> Self {
        Self::new(kind, origin, path, Rewrite::Template(template))
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn captures<'a>(&self, input: &'a str) -> Option<Captures<'a>> {
        self.matcher.captures(input)
    }

    /// Applies the rewrite to a matched input.
    pub fn rewrite(
        &self,
        input: &str,
        captures: &Captures<'_>,
        vars: &HashMap<&str, String>,
    ) -> Result<String, RewriteError> {
        match &self.rewrite {
            Rewrite::PassThrough => Ok(input.to_string()),
            Rewrite::Template(template) => {
                let query_start = template.find('?').unwrap_or(template.len());
                let mut missing = None;
                let mut out = PLACEHOLDER
                    .replace_all(template, |caps: &Captures<'_>| {
                        let name = &caps[1];
                        let value = if let Some(value) = captures.name(name) {
                            value.as_str().to_string()
                        } else if let Some(value) = vars.get(name) {
                            value.clone()
                        } else {
                            missing.get_or_insert_with(|| name.to_string());
                            return String::new();
                        };

                        let in_query = caps.get(0).is_some_and(|m| m.start() > query_start);
                        if in_query {
                            let decoded = percent_decode_str(&value).decode_utf8_lossy();
                            form_urlencoded::byte_serialize(decoded.as_bytes()).collect()
                        } else {
                            value
                        }
                    })
                    .into_owned();

                if let Some(name) = missing {
                    return Err(RewriteError::MissingVariable(name));
                }

                let query = captures
                    .name(QUERY_GROUP)
                    .map(|m| m.as_str())
                    .unwrap_or("");
                if !query.is_empty() {
                    out.push(if out.contains('?') { '&' } else { '?' });
                    out.push_str(query);
                }

                Ok(out)
            }
        }
    }
}

/// Regex for an origin such as `https://wallhaven.cc`.
///
/// The scheme may be http or https; with `allow_www` a leading `www.` is optional.
/// Any path in the origin (e.g. an `/api/v1` base) is matched literally.
pub fn origin_regex(origin: &str, allow_www: bool) -> String {
    let rest = origin
        .trim_end_matches('/')
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    if allow_www {
        let rest = rest.trim_start_matches("www.");
        format!(r"https?://(?:www\.)?{}", regex::escape(rest))
    } else {
        format!("https?://{}", regex::escape(rest))
    }
}
