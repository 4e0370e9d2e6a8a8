use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rendering::headings::extract_headings;

/// A heading whose section number changed between two versions of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMapping {
    /// Cleaned heading text shared by both versions.
    pub text: String,
    pub old_number: String,
    pub new_number: String,
}

/// Compare the section numbering of two versions of the same document.
///
/// Headings are matched by cleaned text only: a renamed heading is a new
/// heading and produces no mapping. When the old version repeats a heading
/// text, the last occurrence is the one matched.
///
/// Mappings are returned in the order the headings appear in `new_content`.
pub fn diff_section_numbers(old_content: &str, new_content: &str) -> Vec<SectionMapping> {
    let old_headings = extract_headings(old_content);
    let new_headings = extract_headings(new_content);

    let old_numbers: HashMap<&str, &str> = old_headings
        .iter()
        .map(|h| (h.text.as_str(), h.number.as_str()))
        .collect();

    new_headings
        .iter()
        .filter_map(|h| {
            let old_number = old_numbers.get(h.text.as_str())?;
            if *old_number == h.number {
                return None;
            }
            Some(SectionMapping {
                text: h.text.clone(),
                old_number: old_number.to_string(),
                new_number: h.number.clone(),
            })
        })
        .collect()
}
