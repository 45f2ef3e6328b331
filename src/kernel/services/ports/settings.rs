use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::kernel::highlight::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default = "default_filetypes")]
    pub filetypes: BTreeMap<String, FiletypeSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_invoker_name")]
    pub invoker_name: String,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipe_buffer_size: Option<usize>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            binary: None,
            debug: false,
            invoker_name: default_invoker_name(),
            read_timeout_ms: default_read_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            pipe_buffer_size: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FiletypeSettings {
    #[serde(default)]
    pub language: Language,
    /// Active kind tags, one character each.
    #[serde(default)]
    pub order: String,
    /// Kind tag (as a one-character string) to highlight group.
    #[serde(default)]
    pub groups: BTreeMap<String, CompactString>,
    #[serde(default)]
    pub ignored: Vec<CompactString>,
}

fn default_invoker_name() -> String {
    "taghl".to_string()
}

fn default_read_timeout_ms() -> u64 {
    5_000
}

fn default_max_in_flight() -> usize {
    5
}

const DEFAULT_GROUPS: &[(char, &str)] = &[
    ('c', "TagHighlightClass"),
    ('d', "TagHighlightPreProc"),
    ('e', "TagHighlightEnumConstant"),
    ('f', "TagHighlightFunction"),
    ('g', "TagHighlightEnum"),
    ('m', "TagHighlightMember"),
    ('n', "TagHighlightNamespace"),
    ('p', "TagHighlightPackage"),
    ('s', "TagHighlightStruct"),
    ('t', "TagHighlightType"),
    ('u', "TagHighlightUnion"),
    ('v', "TagHighlightGlobalVar"),
    ('M', "TagHighlightMethod"),
    ('O', "TagHighlightOverloadedOperator"),
    ('T', "TagHighlightTemplate"),
];

fn profile(language: Language, order: &str, ignored: &[&str]) -> FiletypeSettings {
    FiletypeSettings {
        language,
        order: order.to_string(),
        groups: DEFAULT_GROUPS
            .iter()
            .filter(|(ch, _)| order.contains(*ch))
            .map(|(ch, group)| (ch.to_string(), CompactString::from(*group)))
            .collect(),
        ignored: ignored.iter().map(|s| CompactString::from(*s)).collect(),
    }
}

fn default_filetypes() -> BTreeMap<String, FiletypeSettings> {
    let mut filetypes = BTreeMap::new();
    filetypes.insert(
        "c".to_string(),
        profile(Language::C, "defgmstu", &["NULL", "bool", "true", "false"]),
    );
    filetypes.insert(
        "cpp".to_string(),
        profile(Language::Cpp, "cdefgmnstuMOT", &["NULL", "nullptr", "std"]),
    );
    filetypes.insert(
        "go".to_string(),
        profile(Language::Go, "cefmnpstv", &["nil", "true", "false", "iota"]),
    );
    filetypes
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker: WorkerSettings::default(),
            filetypes: default_filetypes(),
        }
    }
}

impl Settings {
    pub fn filetype(&self, name: &str) -> Option<&FiletypeSettings> {
        self.filetypes.get(name)
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/ports/settings.rs"]
mod tests;
