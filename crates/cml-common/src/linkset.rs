//! The hierarchical link-sets file (§6): a `default` section listing every
//! CML by numeric ID with a per-link channel flag, plus named subsections
//! that override the flag for a subset of links. Links absent from a
//! subsection inherit the `default` value.
//!
//! Persisted as an INI-style key/value file; edits are written back
//! verbatim (same section layout, UTF-8) so the file stays readable and
//! diff-friendly for operators who hand-edit it.

use std::collections::HashMap;
use std::path::Path;

use ini::Ini;

use crate::error::{CmlError, CmlResult};

/// Per-link channel flag: which side(s) of a link to include in assembly.
/// See §4.3 — 0 = skip, 1 = channel A(rx)_B(tx), 2 = channel B(rx)_A(tx),
/// 3 = both channels.
pub type LinkFlag = u8;

/// The fully-resolved mapping used by the assembler: link ID → flag.
pub type LinkSelection = HashMap<i64, LinkFlag>;

const DEFAULT_SECTION: &str = "default";
const DEFAULT_FLAG: LinkFlag = 3;

/// An in-memory, round-trippable view of a link-sets file.
#[derive(Debug, Clone)]
pub struct LinkSetFile {
    ini: Ini,
}

impl LinkSetFile {
    /// Build a fresh file whose `default` section lists every given link ID
    /// with flag `3` and no subsections.
    pub fn new(link_ids: impl IntoIterator<Item = i64>) -> Self {
        let mut ini = Ini::new();
        {
            let mut section = ini.with_section(Some(DEFAULT_SECTION));
            for id in link_ids {
                section.set(id.to_string(), DEFAULT_FLAG.to_string());
            }
        }
        Self { ini }
    }

    /// Load a link-sets file from disk.
    pub fn load(path: impl AsRef<Path>) -> CmlResult<Self> {
        let ini = Ini::load_from_file(path.as_ref())
            .map_err(|e| CmlError::ConfigMissing(format!("link-sets file: {e}")))?;
        Ok(Self { ini })
    }

    /// Persist the file verbatim (UTF-8, same section layout) to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> CmlResult<()> {
        self.ini
            .write_to_file(path.as_ref())
            .map_err(CmlError::Io)
    }

    /// Set the flag for `link_id` within `set_name` (creating the section if
    /// needed). Passing `set_name == "default"` edits the default flag.
    pub fn set_flag(&mut self, set_name: &str, link_id: i64, flag: LinkFlag) {
        self.ini
            .with_section(Some(set_name))
            .set(link_id.to_string(), flag.to_string());
    }

    /// Resolve the effective selection for a named set: start from
    /// `default`, then overlay any entries the named section specifies.
    /// Resolving `"default"` itself just returns the default section.
    pub fn selection(&self, set_name: &str) -> LinkSelection {
        let mut selection = LinkSelection::new();

        if let Some(section) = self.ini.section(Some(DEFAULT_SECTION)) {
            for (key, value) in section.iter() {
                if let (Ok(id), Ok(flag)) = (key.parse::<i64>(), value.parse::<LinkFlag>()) {
                    selection.insert(id, flag);
                }
            }
        }

        if set_name != DEFAULT_SECTION {
            if let Some(section) = self.ini.section(Some(set_name)) {
                for (key, value) in section.iter() {
                    if let (Ok(id), Ok(flag)) = (key.parse::<i64>(), value.parse::<LinkFlag>()) {
                        selection.insert(id, flag);
                    }
                }
            }
        }

        selection
    }

    /// Names of every subsection besides `default`.
    pub fn set_names(&self) -> Vec<String> {
        self.ini
            .sections()
            .filter_map(|s| s)
            .filter(|s| *s != DEFAULT_SECTION)
            .map(|s| s.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_section_round_trips() {
        let set = LinkSetFile::new([1, 2, 3]);
        let selection = set.selection(DEFAULT_SECTION);
        assert_eq!(selection.get(&1), Some(&3));
        assert_eq!(selection.get(&2), Some(&3));
        assert_eq!(selection.get(&3), Some(&3));
    }

    #[test]
    fn subsection_overrides_only_listed_links() {
        let mut set = LinkSetFile::new([1, 2, 3]);
        set.set_flag("storm_2024", 2, 0);
        let selection = set.selection("storm_2024");
        assert_eq!(selection.get(&1), Some(&3));
        assert_eq!(selection.get(&2), Some(&0));
        assert_eq!(selection.get(&3), Some(&3));
    }

    #[test]
    fn unknown_set_falls_back_to_default() {
        let set = LinkSetFile::new([10]);
        let selection = set.selection("nonexistent");
        assert_eq!(selection.get(&10), Some(&3));
    }
}
