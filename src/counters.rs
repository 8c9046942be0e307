//! Static subject → counters database.
//!
//! The database is a JSON array of `{hero, counters}` entries where each
//! counter is either a bare name or an object `{counter, score?}`. Entries are
//! kept in file order; lookups return counter names in that order.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CounterEntryFile {
    hero: String,
    #[serde(default)]
    counters: Vec<CounterRefFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CounterRefFile {
    Name(String),
    Scored {
        counter: String,
        #[allow(dead_code)]
        #[serde(default)]
        score: Option<f64>,
    },
}

impl CounterRefFile {
    fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Scored { counter, .. } => counter,
        }
    }
}

/// In-memory counters lookup.
#[derive(Clone, Debug, Default)]
pub struct CountersDb {
    by_subject: HashMap<String, Vec<String>>,
}

impl CountersDb {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read counters database {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid counters database {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: Vec<CounterEntryFile> = serde_json::from_str(raw)?;
        let mut by_subject = HashMap::with_capacity(entries.len());
        for entry in entries {
            let hero = entry.hero.trim().to_string();
            if hero.is_empty() {
                continue;
            }
            let names = entry
                .counters
                .iter()
                .map(|c| c.name().trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            // first entry for a subject wins
            by_subject.entry(hero).or_insert(names);
        }
        Ok(Self { by_subject })
    }

    /// Counter names for `subject_id`; empty when unknown.
    pub fn counters_for(&self, subject_id: &str) -> Vec<String> {
        self.by_subject.get(subject_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_subject.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_subject.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_counter_shapes() -> Result<()> {
        let db = CountersDb::from_json(
            r#"[
                {"hero": "axe", "counters": [{"counter": "huskar", "score": 4}, {"counter": "ursa"}]},
                {"hero": "lina", "counters": ["pudge", " ", "axe"]},
                {"hero": "axe", "counters": ["ignored"]},
                {"hero": "zeus"}
            ]"#,
        )?;
        assert_eq!(db.len(), 3);
        assert_eq!(db.counters_for("axe"), vec!["huskar", "ursa"]);
        assert_eq!(db.counters_for("lina"), vec!["pudge", "axe"]);
        assert!(db.counters_for("zeus").is_empty());
        assert!(db.counters_for("unknown").is_empty());
        Ok(())
    }

    #[test]
    fn rejects_non_array_root() {
        assert!(CountersDb::from_json(r#"{"hero": "axe"}"#).is_err());
    }
}
