/// Script store: the immutable theme catalog: scripts, metadata and palettes.
use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;

use crate::schema::dialogue::Script;
use crate::schema::theme::{Palette, ThemeEntry, ThemeId, ThemeMetadata};

/// The catalog bundled with the crate.
pub const BUILTIN_CATALOG: &str = include_str!("../../theme_data/catalog.ron");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("theme not found: {0}")]
    NotFound(ThemeId),
    #[error("theme {0} defined more than once")]
    DuplicateTheme(ThemeId),
}

/// Ordered catalog of themes with O(1) lookup by id.
///
/// Order is the order themes were first defined; it drives the selection view.
#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    entries: Vec<ThemeEntry>,
    index: FxHashMap<ThemeId, usize>,
}

impl ScriptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse_ron(BUILTIN_CATALOG)
    }

    /// Build from entries, rejecting duplicate ids.
    pub fn from_entries(entries: Vec<ThemeEntry>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for entry in entries {
            if catalog.index.contains_key(&entry.id) {
                return Err(CatalogError::DuplicateTheme(entry.id));
            }
            catalog.insert(entry);
        }
        Ok(catalog)
    }

    /// Parse a catalog from a RON string containing a list of theme entries.
    ///
    /// Empty scripts, blank lines, unknown speakers and malformed colors are
    /// rejected by the schema types during deserialization.
    pub fn parse_ron(source: &str) -> Result<Self, CatalogError> {
        let entries: Vec<ThemeEntry> = ron::from_str(source)?;
        Self::from_entries(entries)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Merge another catalog into this one. Themes already present are
    /// replaced in place; new themes are appended in `other`'s order.
    pub fn merge(&mut self, other: ScriptCatalog) {
        for entry in other.entries {
            self.insert(entry);
        }
    }

    fn insert(&mut self, entry: ThemeEntry) {
        match self.index.get(&entry.id) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, theme: &ThemeId) -> Option<&ThemeEntry> {
        self.index.get(theme).map(|&i| &self.entries[i])
    }

    fn entry(&self, theme: &ThemeId) -> Result<&ThemeEntry, CatalogError> {
        self.get(theme)
            .ok_or_else(|| CatalogError::NotFound(theme.clone()))
    }

    pub fn get_script(&self, theme: &ThemeId) -> Result<&Script, CatalogError> {
        self.entry(theme).map(|e| &e.script)
    }

    pub fn get_theme_metadata(&self, theme: &ThemeId) -> Result<ThemeMetadata, CatalogError> {
        self.entry(theme).map(ThemeEntry::metadata)
    }

    pub fn get_palette(&self, theme: &ThemeId) -> Result<&Palette, CatalogError> {
        self.entry(theme).map(|e| &e.palette)
    }

    /// Theme ids in catalog order.
    pub fn list_theme_ids(&self) -> Vec<ThemeId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Look up a theme id from user input, ignoring ASCII case and
    /// surrounding whitespace.
    pub fn resolve(&self, raw: &str) -> Option<&ThemeId> {
        let raw = raw.trim();
        self.entries
            .iter()
            .map(|e| &e.id)
            .find(|id| id.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn contains(&self, theme: &ThemeId) -> bool {
        self.index.contains_key(theme)
    }

    pub fn themes(&self) -> impl Iterator<Item = &ThemeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dialogue::SpeakerId;

    const TWO_THEMES: &str = r##"[
        (
            id: "classic",
            name: "Classic",
            accent_color: "#4a5568",
            script: [
                (speaker: 1, text: "Do you like fishsticks?"),
                (speaker: 2, text: "Yeah!"),
            ],
        ),
        (
            id: "space",
            name: "Space",
            accent_color: "#5b21b6",
            script: [(speaker: 1, text: "Do you like space-fishsticks?")],
        ),
    ]"##;

    #[test]
    fn builtin_catalog_loads_in_order() {
        let catalog = ScriptCatalog::builtin().unwrap();
        let ids: Vec<String> = catalog
            .list_theme_ids()
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, ["classic", "pirates", "space", "fantasy"]);

        for id in catalog.list_theme_ids() {
            let script = catalog.get_script(&id).unwrap();
            assert_eq!(script.len(), 6, "theme {id} should have six lines");
            assert_eq!(script.first().speaker(), SpeakerId::One);
        }
    }

    #[test]
    fn builtin_metadata() {
        let catalog = ScriptCatalog::builtin().unwrap();
        let meta = catalog.get_theme_metadata(&ThemeId::from("pirates")).unwrap();
        assert_eq!(meta.display_name, "Pirates");
        assert_eq!(meta.accent_color.hex(), "#2c5282");

        let palette = catalog.get_palette(&ThemeId::from("fantasy")).unwrap();
        assert_eq!(palette.background.hex(), "#064e3b");
    }

    #[test]
    fn unknown_theme_is_not_found() {
        let catalog = ScriptCatalog::parse_ron(TWO_THEMES).unwrap();
        let missing = ThemeId::from("westerns");
        assert!(matches!(
            catalog.get_script(&missing),
            Err(CatalogError::NotFound(id)) if id == missing
        ));
        assert!(catalog.get_theme_metadata(&missing).is_err());
        assert!(!catalog.contains(&missing));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let src = r##"[
            (id: "a", name: "A", accent_color: "#000000", script: [(speaker: 1, text: "x")]),
            (id: "a", name: "A again", accent_color: "#000000", script: [(speaker: 1, text: "y")]),
        ]"##;
        assert!(matches!(
            ScriptCatalog::parse_ron(src),
            Err(CatalogError::DuplicateTheme(_))
        ));
    }

    #[test]
    fn empty_script_rejected() {
        let src = r##"[(id: "a", name: "A", accent_color: "#000000", script: [])]"##;
        assert!(matches!(
            ScriptCatalog::parse_ron(src),
            Err(CatalogError::Ron(_))
        ));
    }

    #[test]
    fn merge_overrides_and_appends() {
        let mut catalog = ScriptCatalog::parse_ron(TWO_THEMES).unwrap();
        let extra = ScriptCatalog::parse_ron(
            r##"[
                (id: "space", name: "Deep Space", accent_color: "#000000", script: [(speaker: 2, text: "Beep.")]),
                (id: "westerns", name: "Westerns", accent_color: "#8b4513", script: [(speaker: 1, text: "Howdy.")]),
            ]"##,
        )
        .unwrap();
        catalog.merge(extra);

        let ids: Vec<String> = catalog.list_theme_ids().into_iter().map(|id| id.0).collect();
        assert_eq!(ids, ["classic", "space", "westerns"]);
        let space = catalog.get_theme_metadata(&ThemeId::from("space")).unwrap();
        assert_eq!(space.display_name, "Deep Space");
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let catalog = ScriptCatalog::parse_ron(TWO_THEMES).unwrap();
        assert_eq!(catalog.resolve(" Classic "), Some(&ThemeId::from("classic")));
        assert_eq!(catalog.resolve("SPACE"), Some(&ThemeId::from("space")));
        assert_eq!(catalog.resolve("pirates"), None);
    }
}
