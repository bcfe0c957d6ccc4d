//! Load order reconciliation.
//!
//! Compares a submitted load order against the master list, case-folded
//! line by line, and renders what is missing and what should not be there.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

/// Header of the section listing master lines absent from a submission.
pub const MISSING_HEADER: &str = "Your loadorder is missing:\n";

/// Header of the section listing submitted lines absent from the master.
pub const EXTRA_HEADER: &str = "\nYour loadorder should not have:\n";

/// Lines excluded from both sections of a report. Stored case-folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet(HashSet<String>);

impl SkipSet {
    /// Parse skips file text, one line per entry.
    pub fn parse(text: &str) -> Self {
        text.lines().collect()
    }

    pub fn contains(&self, normalized_line: &str) -> bool {
        self.0.contains(normalized_line)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SkipSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|line| line.as_ref().to_lowercase()).collect())
    }
}

/// Explanations appended to unexpected lines. Keys are stored case-folded;
/// values are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonsMap(HashMap<String, String>);

impl ReasonsMap {
    /// Parse a JSON object of string values.
    ///
    /// Keys are folded in document order, so of two keys differing only
    /// in case the later one wins.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn get(&self, normalized_line: &str) -> Option<&str> {
        self.0.get(normalized_line).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ReasonsMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(line, reason)| (line.as_ref().to_lowercase(), reason.into()))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for ReasonsMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ReasonsVisitor;

        impl<'de> Visitor<'de> for ReasonsVisitor {
            type Value = ReasonsMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of string reasons")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ReasonsMap, A::Error> {
                let mut reasons = HashMap::new();
                while let Some((line, reason)) = access.next_entry::<String, String>()? {
                    reasons.insert(line.to_lowercase(), reason);
                }
                Ok(ReasonsMap(reasons))
            }
        }

        deserializer.deserialize_map(ReasonsVisitor)
    }
}

/// Render the differences between `master` and `submitted`.
///
/// Both texts are split into lines and case-folded. Blank lines are
/// ignored. Master lines absent from the submission are listed first in
/// master order, then submitted lines absent from the master in submission
/// order, each followed by its reason if one exists. Lines in `skips` are
/// never listed and an empty section is omitted with its header, so a
/// matching submission yields `""`.
pub fn compare(master: &str, submitted: &str, skips: &SkipSet, reasons: &ReasonsMap) -> String {
    let master: Vec<String> = master.lines().map(str::to_lowercase).collect();
    let submitted: Vec<String> = submitted.lines().map(str::to_lowercase).collect();

    let master_set: HashSet<&str> = master.iter().map(String::as_str).collect();
    let submitted_set: HashSet<&str> = submitted.iter().map(String::as_str).collect();

    let mut missing = String::new();
    for line in &master {
        if line.trim().is_empty() || submitted_set.contains(line.as_str()) || skips.contains(line) {
            continue;
        }
        missing.push_str(line);
        missing.push('\n');
    }

    let mut extra = String::new();
    for line in &submitted {
        if line.trim().is_empty() || master_set.contains(line.as_str()) || skips.contains(line) {
            continue;
        }
        extra.push_str(line);
        if let Some(reason) = reasons.get(line) {
            extra.push_str(reason);
        }
        extra.push('\n');
    }

    let mut report = String::new();
    if !missing.is_empty() {
        report.push_str(MISSING_HEADER);
        report.push_str(&missing);
    }
    if !extra.is_empty() {
        report.push_str(EXTRA_HEADER);
        report.push_str(&extra);
    }
    report
}
