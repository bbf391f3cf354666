//! Ordered DNS-name resolution from instance tags.

use super::InstanceTag;

pub const TAG_PUBLIC_DNS: &str = "PublicDNS";
pub const TAG_NAME: &str = "Name";

/// DNS name resolved from instance tags, tracking which tag supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedName {
    /// Taken from the `PublicDNS` tag.
    PublicDns(String),
    /// `PublicDNS` was missing or empty; fell back to the `Name` tag.
    NameFallback(String),
}

impl ResolvedName {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedName::PublicDns(name) | ResolvedName::NameFallback(name) => name,
        }
    }
}

/// Resolve the target DNS name for an instance. The `PublicDNS` tag wins,
/// then `Name`; empty tag values count as absent. Returns `None` when
/// neither tag yields a usable name.
pub fn resolve_dns_name(tags: &[InstanceTag]) -> Option<ResolvedName> {
    if let Some(value) = find_tag_value(tags, TAG_PUBLIC_DNS) {
        return Some(ResolvedName::PublicDns(value));
    }

    find_tag_value(tags, TAG_NAME).map(ResolvedName::NameFallback)
}

fn find_tag_value(tags: &[InstanceTag], key: &str) -> Option<String> {
    tags.iter()
        .find(|tag| tag.key == key && !tag.value.is_empty())
        .map(|tag| tag.value.clone())
}
