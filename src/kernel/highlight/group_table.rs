//! Kind tag → highlight group lookup for one language profile.
//!
//! A table is built once per filetype from settings and shared read-only
//! between classification runs.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::kernel::services::ports::settings::FiletypeSettings;

/// Single-character semantic category used as the key into a [`GroupTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindTag(char);

impl KindTag {
    pub const CLASS: Self = Self('c');
    pub const ENUM: Self = Self('g');
    pub const ENUM_CONST: Self = Self('e');
    pub const FUNCTION: Self = Self('f');
    pub const GLOBAL_VAR: Self = Self('v');
    pub const MEMBER: Self = Self('m');
    pub const NAMESPACE: Self = Self('n');
    pub const PACKAGE: Self = Self('p');
    pub const PREPROC: Self = Self('d');
    pub const STRUCT: Self = Self('s');
    pub const TYPE: Self = Self('t');
    pub const UNION: Self = Self('u');
    pub const TEMPLATE: Self = Self('T');
    pub const METHOD: Self = Self('M');
    pub const OVERLOADED_OP: Self = Self('O');

    pub const fn new(ch: char) -> Self {
        Self(ch)
    }

    pub const fn as_char(self) -> char {
        self.0
    }
}

impl From<char> for KindTag {
    fn from(ch: char) -> Self {
        Self(ch)
    }
}

impl std::fmt::Display for KindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source-language profile a table is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    C,
    Cpp,
    Go,
    Other,
}

impl Language {
    /// The base language does not distinguish records at reference sites, so
    /// type references are never resolved further.
    pub fn is_base(self) -> bool {
        matches!(self, Language::C)
    }
}

/// Identifier spellings that must never be highlighted.
///
/// Kept sorted and deduplicated so membership is a binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    words: Vec<CompactString>,
}

impl IgnoreList {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        let mut words: Vec<CompactString> = words.into_iter().map(Into::into).collect();
        words.sort_unstable();
        words.dedup();
        Self { words }
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.words
            .binary_search_by(|word| word.as_str().cmp(ident))
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    language: Language,
    active: Vec<KindTag>,
    groups: FxHashMap<KindTag, CompactString>,
    ignored: IgnoreList,
}

impl GroupTable {
    /// `order` lists the active kinds; entries of `groups` outside it never match.
    pub fn new<G, S>(language: Language, order: &str, groups: G, ignored: IgnoreList) -> Self
    where
        G: IntoIterator<Item = (KindTag, S)>,
        S: Into<CompactString>,
    {
        let mut active: Vec<KindTag> = Vec::with_capacity(order.len());
        for tag in order.chars().map(KindTag::from) {
            if !active.contains(&tag) {
                active.push(tag);
            }
        }

        Self {
            language,
            active,
            groups: groups
                .into_iter()
                .map(|(tag, group)| (tag, group.into()))
                .collect(),
            ignored,
        }
    }

    pub fn from_settings(settings: &FiletypeSettings) -> Self {
        let mut groups = Vec::with_capacity(settings.groups.len());
        for (key, group) in &settings.groups {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => groups.push((KindTag::from(ch), group.clone())),
                _ => tracing::warn!(key = %key, "ignoring group entry with a non single-character kind"),
            }
        }

        Self::new(
            settings.language,
            &settings.order,
            groups,
            IgnoreList::new(settings.ignored.iter().cloned()),
        )
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_active(&self, tag: KindTag) -> bool {
        self.active.contains(&tag)
    }

    pub fn active_kinds(&self) -> &[KindTag] {
        &self.active
    }

    pub fn find_group(&self, tag: KindTag) -> Option<&str> {
        if !self.is_active(tag) {
            return None;
        }
        self.groups.get(&tag).map(CompactString::as_str)
    }

    pub fn is_ignored(&self, ident: &str) -> bool {
        self.ignored.contains(ident)
    }

    pub fn ignored(&self) -> &IgnoreList {
        &self.ignored
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/highlight/group_table.rs"]
mod tests;
