//! Archetype header: identification, language and descriptive metadata.

use crate::{ArchetypeId, LocalCode};

/// A translation declared in the `language` section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Translation {
    /// ISO 639-1 language code.
    pub language: String,
    /// Translator details as ordered key/value pairs.
    pub author: Vec<(String, String)>,
}

/// Language-specific part of the `description` section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DescriptionDetail {
    /// ISO 639-1 language code.
    pub language: String,
    /// Purpose of the archetype.
    pub purpose: Option<String>,
    /// Intended use.
    #[cfg_attr(feature = "serde", serde(rename = "use"))]
    pub usage: Option<String>,
    /// Known misuse.
    pub misuse: Option<String>,
    /// Search keywords.
    pub keywords: Vec<String>,
}

/// The `description` section of an archetype.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchetypeDescription {
    /// Original author details as ordered key/value pairs.
    pub original_author: Vec<(String, String)>,
    /// Lifecycle state such as "AuthorDraft".
    pub lifecycle_state: Option<String>,
    /// Per-language details.
    pub details: Vec<DescriptionDetail>,
}

impl ArchetypeDescription {
    /// Returns the details for a language, if present.
    pub fn detail(&self, language: &str) -> Option<&DescriptionDetail> {
        self.details.iter().find(|d| d.language == language)
    }
}

/// Everything an archetype declares before its `definition` section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchetypeHeader {
    /// Globally unique identifier.
    pub id: ArchetypeId,
    /// ADL version from the header, e.g. "1.4".
    pub adl_version: String,
    /// Code of the concept the archetype defines (the root node code).
    pub concept: LocalCode,
    /// Language the archetype was authored in; fallback for term lookups.
    pub original_language: String,
    /// Declared translations.
    pub translations: Vec<Translation>,
    /// Descriptive metadata, if the section is present.
    pub description: Option<ArchetypeDescription>,
}

impl ArchetypeHeader {
    /// Returns the original language followed by every translation language.
    pub fn languages(&self) -> Vec<&str> {
        std::iter::once(self.original_language.as_str())
            .chain(self.translations.iter().map(|t| t.language.as_str()))
            .collect()
    }
}
