//! The label-override table and label text resolution.
//!
//! Plan-area names as stored in the feature service are all-caps and
//! sometimes unwieldy ("GREATER NORTH PARK"). A small curated table maps
//! them to friendlier, possibly multi-line display strings. The table is
//! optional in every sense: it may be absent from the configuration, fail
//! to load, or miss a key — each case falls back to the next step of the
//! resolution chain.

use std::collections::HashMap;

use log::warn;

use crate::config::LabelRule;
use crate::features::PlanAreaFeature;

/// Read-only mapping from an uppercased plan-area name to its display
/// string.
#[derive(Debug, Default)]
pub struct LabelOverrides {
    entries: HashMap<String, String>,
}

impl LabelOverrides {
    /// Parses the two-column `KEY,LABEL` table.
    ///
    /// The first line is a header and is only loosely validated. Every
    /// other line is split on the first comma; rows with an empty key are
    /// skipped. `|` inside a label marks a forced line break.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines();
        match lines.next() {
            Some(header) if header.trim().eq_ignore_ascii_case("key,label") => {}
            Some(header) => warn!("unexpected label override header: {header:?}"),
            None => warn!("label override table is empty"),
        }

        let mut entries = HashMap::new();
        for line in lines {
            let Some((key, label)) = line.split_once(',') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let label = label
                .split('|')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n");
            entries.insert(key.to_uppercase(), label);
        }

        Self { entries }
    }

    /// Loads the table from an `http(s)` URL or a local file path.
    ///
    /// Returns `None` on any failure. Labels then fall back to raw
    /// attribute values; the map itself is unaffected.
    pub async fn load(source: &str) -> Option<Self> {
        let text = if source.starts_with("http://") || source.starts_with("https://") {
            match fetch(source).await {
                Ok(text) => text,
                Err(err) => {
                    warn!("failed to load label overrides from {source}: {err}");
                    return None;
                }
            }
        } else {
            match std::fs::read_to_string(source) {
                Ok(text) => text,
                Err(err) => {
                    warn!("failed to read label overrides from {source}: {err}");
                    return None;
                }
            }
        };

        let table = Self::parse(&text);
        log::info!("loaded {} label overrides from {source}", table.len());
        Some(table)
    }

    /// Looks up the display string for a plan-area name. Case-insensitive
    /// on the key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.trim().to_uppercase()).map(String::as_str)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn fetch(url: &str) -> Result<String, reqwest::Error> {
    reqwest::get(url).await?.error_for_status()?.text().await
}

/// True when the rule suppresses a label for this attribute value.
pub fn suppressed(rule: &LabelRule, value: Option<&str>) -> bool {
    match value {
        Some(value) => rule
            .suppress
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(value)),
        None => false,
    }
}

/// True when the rule allows a label for this value at this zoom.
pub fn label_visible(rule: &LabelRule, z_level: u32, value: Option<&str>) -> bool {
    if rule.min_zoom.is_some_and(|min| z_level < min) {
        return false;
    }
    !suppressed(rule, value)
}

/// Resolves the display text for a feature.
///
/// Precedence is fixed: override table (when the overlay uses it, keyed by
/// the uppercased attribute value) → the attribute value itself → the
/// rule's fixed text → the overlay title.
pub fn resolve_text(
    rule: &LabelRule,
    use_overrides: bool,
    overrides: Option<&LabelOverrides>,
    title: &str,
    feature: &PlanAreaFeature,
) -> String {
    let value = rule
        .property
        .as_deref()
        .and_then(|property| feature.attribute(property));

    if use_overrides {
        if let (Some(value), Some(table)) = (value, overrides) {
            if let Some(text) = table.get(value) {
                return text.to_string();
            }
        }
    }

    if let Some(value) = value {
        return value.to_string();
    }
    if let Some(text) = &rule.text {
        return text.clone();
    }
    title.to_string()
}
