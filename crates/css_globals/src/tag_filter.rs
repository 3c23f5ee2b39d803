//! Which nodes can change the set of stylesheets.

use dom::{MutationEntry, MutationRecord};

/// Tags whose insertion or removal can add or drop a stylesheet.
pub const STYLE_TAG_NAMES: [&str; 2] = ["STYLE", "LINK"];

/// Case-insensitive membership test. Non-elements (`None`) never match.
pub fn is_allowed_tag_name(tag: Option<&str>, allowed: &[&str]) -> bool {
    tag.is_some_and(|tag_name| {
        allowed
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(tag_name))
    })
}

pub fn is_style_or_link_node(entry: &MutationEntry) -> bool {
    is_allowed_tag_name(entry.tag.as_deref(), &STYLE_TAG_NAMES)
}

/// True when any child-list record adds or removes a `<style>` or `<link>`.
pub fn batch_touches_styles(records: &[MutationRecord]) -> bool {
    records.iter().any(|record| match record {
        MutationRecord::ChildList { added, removed, .. } => added
            .iter()
            .chain(removed)
            .any(is_style_or_link_node),
        MutationRecord::Attributes { .. } | MutationRecord::CharacterData { .. } => false,
    })
}
