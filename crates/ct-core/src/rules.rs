//! Category rule table and event classification.
//!
//! The table is an ordered mapping of category name to
//! `{ title, patterns, children }`. A pattern matches when its `regex`
//! matches at the start of the trimmed summary, or when the event's calendar
//! equals (or is listed in) its `calendarId`. Children nest one level under
//! their parent and produce `parent/child` paths.
//!
//! Matching and anomaly detection are separate: [`RuleTable::classify`]
//! returns every match in table order, [`check_classification`] inspects the
//! result.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{CategoryMatch, Event};
use crate::types::EventId;

/// Rule table errors.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A category pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?} in category {category}: {source}")]
    InvalidPattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A mapping that keeps its keys in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ordered<T>(Vec<(String, T)>);

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ordered<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = Ordered<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category names to category rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// `calendarId` accepts a single id or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
struct RawPattern {
    #[serde(default)]
    regex: Option<String>,
    #[serde(default, rename = "calendarId")]
    calendar_id: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawChild {
    title: String,
    #[serde(default)]
    patterns: Vec<RawPattern>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    title: String,
    #[serde(default)]
    patterns: Vec<RawPattern>,
    #[serde(default)]
    children: Ordered<RawChild>,
}

/// One compiled match pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: Option<String>,
    regex: Option<Regex>,
    calendar_ids: Vec<String>,
}

impl Pattern {
    fn compile(category: &str, raw: RawPattern) -> Result<Self, RuleError> {
        let regex = raw
            .regex
            .as_deref()
            .map(compile_prefix)
            .transpose()
            .map_err(|source| RuleError::InvalidPattern {
                category: category.to_string(),
                pattern: raw.regex.clone().unwrap_or_default(),
                source,
            })?;
        let calendar_ids = match raw.calendar_id {
            Some(OneOrMany::One(id)) => vec![id],
            Some(OneOrMany::Many(ids)) => ids,
            None => Vec::new(),
        };
        Ok(Self {
            source: raw.regex,
            regex,
            calendar_ids,
        })
    }

    /// The regex as written in the table.
    pub fn regex_source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn matches(&self, summary: &str, calendar_id: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(summary))
            || self.calendar_ids.iter().any(|id| id == calendar_id)
    }
}

/// Compiles `pattern` so it only matches at the start of the haystack.
pub(crate) fn compile_prefix(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// A category with its patterns.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub title: String,
    pub patterns: Vec<Pattern>,
    /// Empty for child categories.
    pub children: Vec<Category>,
}

impl Category {
    fn matches(&self, summary: &str, calendar_id: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(summary, calendar_id))
    }
}

/// Ordered category rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    categories: Vec<Category>,
}

impl RuleTable {
    /// Parses a JSON rule table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Every matching `(path, title)` pair for `event`, in table order.
    pub fn classify(&self, event: &Event) -> Vec<CategoryMatch> {
        let summary = event.summary.trim();
        let calendar_id = event.calendar_id.as_ref().map_or("", |id| id.as_str());

        let mut matches = Vec::new();
        for category in &self.categories {
            if category.matches(summary, calendar_id) {
                matches.push(CategoryMatch::new(&category.name, &category.title));
            }
            for child in &category.children {
                if child.matches(summary, calendar_id) {
                    matches.push(CategoryMatch::new(
                        format!("{}/{}", category.name, child.name),
                        &child.title,
                    ));
                }
            }
        }
        matches
    }

    fn compile(raw: Ordered<RawCategory>) -> Result<Self, RuleError> {
        let categories = raw
            .0
            .into_iter()
            .map(|(name, category)| {
                let patterns = compile_patterns(&name, category.patterns)?;
                let children = category
                    .children
                    .0
                    .into_iter()
                    .map(|(child_name, child)| {
                        let path = format!("{name}/{child_name}");
                        Ok(Category {
                            patterns: compile_patterns(&path, child.patterns)?,
                            name: child_name,
                            title: child.title,
                            children: Vec::new(),
                        })
                    })
                    .collect::<Result<Vec<_>, RuleError>>()?;
                Ok(Category {
                    name,
                    title: category.title,
                    patterns,
                    children,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Ok(Self { categories })
    }
}

fn compile_patterns(category: &str, raw: Vec<RawPattern>) -> Result<Vec<Pattern>, RuleError> {
    raw.into_iter()
        .map(|pattern| Pattern::compile(category, pattern))
        .collect()
}

impl<'de> Deserialize<'de> for RuleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Ordered::<RawCategory>::deserialize(deserializer)?;
        Self::compile(raw).map_err(serde::de::Error::custom)
    }
}

/// A classification anomaly. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationWarning {
    /// No category matched.
    Unclassified { event_id: EventId, summary: String },
    /// Categories under more than one top-level category matched.
    MultipleTopLevel {
        event_id: EventId,
        summary: String,
        categories: Vec<String>,
    },
}

impl fmt::Display for ClassificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified { summary, .. } => write!(f, "unclassified: {summary:?}"),
            Self::MultipleTopLevel {
                summary,
                categories,
                ..
            } => write!(
                f,
                "multiple top-level categories for {summary:?}: {}",
                categories.join(", ")
            ),
        }
    }
}

/// Inspects a classified event for anomalies.
pub fn check_classification(event: &Event) -> Option<ClassificationWarning> {
    if event.categories.is_empty() {
        return Some(ClassificationWarning::Unclassified {
            event_id: event.id.clone(),
            summary: event.summary.clone(),
        });
    }
    let top_levels: BTreeSet<&str> = event.categories.iter().map(CategoryMatch::top_level).collect();
    (top_levels.len() > 1).then(|| ClassificationWarning::MultipleTopLevel {
        event_id: event.id.clone(),
        summary: event.summary.clone(),
        categories: event.categories.iter().map(|c| c.path.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, FixedOffset};

    use crate::types::CalendarId;

    const TABLE: &str = r#"{
        "work": {
            "title": "Work",
            "patterns": [{"calendarId": ["work@example.com", "team@example.com"]}],
            "children": {
                "meetings": {"title": "Meetings", "patterns": [{"regex": "(?i)meeting|standup"}]},
                "review": {"title": "Code Review", "patterns": [{"regex": "Review"}]}
            }
        },
        "health": {
            "title": "Health",
            "patterns": [{"regex": "Gym"}, {"regex": "Run"}]
        },
        "admin": {
            "title": "Admin",
            "patterns": [{"calendarId": "admin@example.com"}]
        }
    }"#;

    fn event(summary: &str, calendar: Option<&str>) -> Event {
        let at = |s: &str| DateTime::<FixedOffset>::parse_from_rfc3339(s).unwrap();
        let mut event = Event::timed(
            EventId::new("e").unwrap(),
            summary,
            at("2024-01-02T09:00:00Z"),
            at("2024-01-02T10:00:00Z"),
            None,
        );
        event.calendar_id = calendar.map(|c| CalendarId::new(c).unwrap());
        event
    }

    fn paths(matches: &[CategoryMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.path.as_str()).collect()
    }

    #[test]
    fn preserves_document_order() {
        let table = RuleTable::from_json(TABLE).unwrap();
        let names: Vec<_> = table.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["work", "health", "admin"]);
        let children: Vec<_> = table.categories()[0]
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(children, vec!["meetings", "review"]);
    }

    #[test]
    fn regex_matches_only_at_start_of_trimmed_summary() {
        let table = RuleTable::from_json(TABLE).unwrap();
        assert_eq!(paths(&table.classify(&event("  Gym session", None))), vec!["health"]);
        assert!(table.classify(&event("Evening Gym", None)).is_empty());
    }

    #[test]
    fn calendar_id_matches_string_or_list() {
        let table = RuleTable::from_json(TABLE).unwrap();
        assert_eq!(
            paths(&table.classify(&event("Planning", Some("team@example.com")))),
            vec!["work"]
        );
        assert_eq!(
            paths(&table.classify(&event("Taxes", Some("admin@example.com")))),
            vec!["admin"]
        );
    }

    #[test]
    fn children_produce_nested_paths_in_table_order() {
        let table = RuleTable::from_json(TABLE).unwrap();
        let matches = table.classify(&event("Standup", Some("work@example.com")));
        assert_eq!(paths(&matches), vec!["work", "work/meetings"]);
        assert_eq!(matches[1].title, "Meetings");
        assert!(check_classification(&Event {
            categories: matches,
            ..event("Standup", None)
        })
        .is_none());
    }

    #[test]
    fn multiple_top_level_matches_are_reported() {
        let table = RuleTable::from_json(TABLE).unwrap();
        let mut e = event("Run with team", Some("work@example.com"));
        e.categories = table.classify(&e);
        assert_eq!(paths(&e.categories), vec!["work", "health"]);

        let warning = check_classification(&e).unwrap();
        assert!(matches!(
            &warning,
            ClassificationWarning::MultipleTopLevel { categories, .. } if categories.len() == 2
        ));
        assert_eq!(
            warning.to_string(),
            r#"multiple top-level categories for "Run with team": work, health"#
        );
    }

    #[test]
    fn empty_categories_are_unclassified() {
        let e = event("Mystery", None);
        assert!(matches!(
            check_classification(&e),
            Some(ClassificationWarning::Unclassified { .. })
        ));
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = check_classification(&event("Mystery", None)).unwrap();
        insta::assert_snapshot!(serde_json::to_string_pretty(&warning).unwrap(), @r#"
        {
          "kind": "unclassified",
          "event_id": "e",
          "summary": "Mystery"
        }
        "#);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = RuleTable::from_json(r#"{"x": {"title": "X", "patterns": [{"regex": "("}]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn category_without_patterns_never_matches() {
        let table = RuleTable::from_json(r#"{"x": {"title": "X"}}"#).unwrap();
        assert!(table.classify(&event("anything", None)).is_empty());
    }
}
