//! Character-level normalization: accent folding and extracted-text cleanup.

use finl_unicode::categories::CharacterCategories;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

lazy_static! {
    static ref HORIZONTAL_SPACE: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// How accented characters are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldingPolicy {
    /// NFKC + lowercase. "aviación" and "aviacion" are different terms.
    None,
    /// NFKD, combining marks stripped, lowercase. "aviación" folds to "aviacion".
    #[default]
    Diacritics,
}

/// Normalize one word run according to the folding policy.
///
/// ```
/// use folio::analysis::{FoldingPolicy, fold_term};
///
/// assert_eq!(fold_term("Aviación", FoldingPolicy::Diacritics), "aviacion");
/// assert_eq!(fold_term("Aviación", FoldingPolicy::None), "aviación");
/// ```
pub fn fold_term(word: &str, policy: FoldingPolicy) -> String {
    match policy {
        FoldingPolicy::None => word.nfkc().collect::<String>().to_lowercase(),
        FoldingPolicy::Diacritics => word
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase(),
    }
}

/// Clean text produced by an extraction backend.
///
/// Applies NFKC, drops every character of the Unicode "other" category
/// (controls, format characters such as soft hyphens and zero-width spaces,
/// private use, unassigned) except newline and tab,
/// collapses runs of spaces and tabs, limits blank lines to one, and trims
/// every line.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized: String = text
        .nfkc()
        .filter(|c| !c.is_other() || *c == '\n' || *c == '\t')
        .collect();
    let collapsed = HORIZONTAL_SPACE.replace_all(&normalized, " ");
    let collapsed = EXCESS_NEWLINES.replace_all(&collapsed, "\n\n");

    collapsed
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
