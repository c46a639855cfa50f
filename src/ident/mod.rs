//! Identifier derivation and the shared table registry.
//!
//! Names arriving from form definitions are arbitrary XML names; everything
//! that reaches the backend must be a safe, bounded relational identifier.
//! The naming convention has changed over time, so resolution tries every
//! historical strategy in order against the registered tables.

pub mod registry;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

pub use registry::{TableDescriptor, TableRegistry};

/// Maximum length of a generated identifier (table or column name).
/// Overflow is a plain prefix cut with no collision resolution.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^a-z0-9_]").unwrap();
}

/// Normalizes a raw name into a relational-identifier-safe string:
/// lowercased, with every unsafe character collapsed to an underscore.
pub fn sanitize(name: &str) -> String {
    UNSAFE_CHARS.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// Joins a parent and child name segment into one identifier path.
pub fn formatted_join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        sanitize(child)
    } else {
        format!("{}_{}", sanitize(parent), sanitize(child))
    }
}

/// Strips a redundant leading parent prefix from a child tag. Some forms
/// name children as `parent_child`; their instance data carries the short
/// name, so both spellings must land on the same identifier. Comparison
/// walks chars, never byte offsets, so multibyte names pass through intact.
pub fn data_name(parent_name: &str, child_name: &str) -> String {
    let mut child = child_name.char_indices();
    for expected in parent_name.chars() {
        match child.next() {
            Some((_, c)) if c.eq_ignore_ascii_case(&expected) => {}
            _ => return child_name.to_string(),
        }
    }
    match child.next() {
        // drop the separator that follows the parent prefix
        Some((idx, sep)) => child_name[idx + sep.len_utf8()..].to_string(),
        None => child_name.to_string(),
    }
}

/// Prefix-cuts an identifier to [`MAX_IDENTIFIER_LENGTH`]. Two very long,
/// similarly-prefixed names may legitimately truncate to the same identifier;
/// the cut itself never disambiguates.
pub fn truncate(identifier: &str) -> String {
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        warn!(
            "identifier '{}' exceeds {} characters, truncating",
            identifier, MAX_IDENTIFIER_LENGTH
        );
        identifier[..MAX_IDENTIFIER_LENGTH].to_string()
    } else {
        identifier.to_string()
    }
}

/// Form-level inputs to table naming.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingContext<'a> {
    pub domain: Option<&'a str>,
    pub version: Option<u32>,
}

/// Current strategy: `schema_<domain>_<path>_v<version>`, with the domain
/// and version segments omitted when the form carries neither.
fn name_with_domain_and_version(path: &str, ctx: &NamingContext<'_>) -> String {
    let mut name = String::from("schema_");
    if let Some(domain) = ctx.domain {
        name.push_str(&sanitize(domain));
        name.push('_');
    }
    name.push_str(&sanitize(path));
    if let Some(version) = ctx.version {
        name.push_str(&format!("_v{}", version));
    }
    truncate(&name)
}

/// Pre-domain strategy: `schema_<path>_v<version>`.
fn name_with_version(path: &str, ctx: &NamingContext<'_>) -> String {
    let mut name = format!("schema_{}", sanitize(path));
    if let Some(version) = ctx.version {
        name.push_str(&format!("_v{}", version));
    }
    truncate(&name)
}

/// Legacy strategy: `schema_<path>`.
fn name_legacy(path: &str, _ctx: &NamingContext<'_>) -> String {
    truncate(&format!("schema_{}", sanitize(path)))
}

type NamingStrategy = fn(&str, &NamingContext<'_>) -> String;

/// All known strategies, newest first. Resolution walks this list so schemas
/// registered under earlier conventions keep working.
pub const NAMING_STRATEGIES: [NamingStrategy; 3] =
    [name_with_domain_and_version, name_with_version, name_legacy];

/// Derives the table identifier for a qualified path under the current
/// naming strategy.
pub fn derive_table_name(qualified_path: &str, ctx: &NamingContext<'_>) -> String {
    name_with_domain_and_version(qualified_path, ctx)
}
