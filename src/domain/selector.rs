//! Label and field selectors used to filter lists and watches.
//!
//! Both selector kinds are a comma-separated conjunction of requirements.
//! Label selectors accept `k=v`, `k==v`, `k!=v`, `k` and `!k`; field
//! selectors accept only the three comparison forms.

use std::fmt;
use std::str::FromStr;

use super::ResourceObject;

/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    /// A requirement had an empty key.
    #[error("empty key in selector requirement {0:?}")]
    EmptyKey(String),
    /// A requirement form that the selector kind does not support.
    #[error("unsupported selector requirement {0:?}")]
    Unsupported(String),
}

/// One clause of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// `key=value` or `key==value`.
    Equals(String, String),
    /// `key!=value`. Also satisfied when the key is absent.
    NotEquals(String, String),
    /// `key` (labels only).
    Exists(String),
    /// `!key` (labels only).
    NotExists(String),
}

impl Requirement {
    fn matches(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        match self {
            Self::Equals(key, value) => lookup(key).as_deref() == Some(value.as_str()),
            Self::NotEquals(key, value) => lookup(key).as_deref() != Some(value.as_str()),
            Self::Exists(key) => lookup(key).is_some(),
            Self::NotExists(key) => lookup(key).is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(k, v) => write!(f, "{k}={v}"),
            Self::NotEquals(k, v) => write!(f, "{k}!={v}"),
            Self::Exists(k) => write!(f, "{k}"),
            Self::NotExists(k) => write!(f, "!{k}"),
        }
    }
}

/// Conjunction of [`Requirement`]s. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Parses a label selector.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] on an empty key or a set-based clause.
    pub fn parse_labels(raw: &str) -> Result<Self, SelectorError> {
        Self::parse(raw, true)
    }

    /// Parses a field selector.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] on an empty key or an existence clause.
    pub fn parse_fields(raw: &str) -> Result<Self, SelectorError> {
        Self::parse(raw, false)
    }

    fn parse(raw: &str, allow_existence: bool) -> Result<Self, SelectorError> {
        let mut requirements = Vec::new();
        for clause in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let requirement = if let Some((key, value)) = clause.split_once("!=") {
                Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = clause.split_once("==") {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = clause.split_once('=') {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else if !allow_existence || clause.contains(' ') || clause.contains('(') {
                return Err(SelectorError::Unsupported(clause.to_string()));
            } else if let Some(key) = clause.strip_prefix('!') {
                Requirement::NotExists(key.trim().to_string())
            } else {
                Requirement::Exists(clause.to_string())
            };

            let key = match &requirement {
                Requirement::Equals(k, _)
                | Requirement::NotEquals(k, _)
                | Requirement::Exists(k)
                | Requirement::NotExists(k) => k,
            };
            if key.is_empty() {
                return Err(SelectorError::EmptyKey(clause.to_string()));
            }
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }

    /// Returns `true` if the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Adds a requirement, builder style.
    #[must_use]
    pub fn and(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Evaluates the selector against an object's labels.
    #[must_use]
    pub fn matches_labels(&self, obj: &ResourceObject) -> bool {
        self.requirements
            .iter()
            .all(|r| r.matches(|key| obj.label(key).map(str::to_string)))
    }

    /// Evaluates the selector against an object's fields.
    #[must_use]
    pub fn matches_fields(&self, obj: &ResourceObject) -> bool {
        self.requirements.iter().all(|r| r.matches(|path| obj.field(path)))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_labels(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj() -> ResourceObject {
        ResourceObject::new("w-1", Some("prod".to_string()))
            .with_label("app", "shop")
            .with_label("tier", "web")
            .with_field("status", json!({ "phase": "Running" }))
    }

    #[test]
    fn empty_selector_matches_all() {
        let Ok(sel) = Selector::parse_labels("") else {
            panic!("empty selector must parse");
        };
        assert!(sel.is_empty());
        assert!(sel.matches_labels(&obj()));
        assert!(Selector::everything().matches_fields(&obj()));
    }

    #[test]
    fn label_equality_and_inequality() {
        let Ok(sel) = Selector::parse_labels("app=shop, tier!=db") else {
            panic!("selector must parse");
        };
        assert!(sel.matches_labels(&obj()));

        let Ok(sel) = Selector::parse_labels("app==other") else {
            panic!("selector must parse");
        };
        assert!(!sel.matches_labels(&obj()));
    }

    #[test]
    fn label_existence() {
        let Ok(sel) = Selector::parse_labels("app,!canary") else {
            panic!("selector must parse");
        };
        assert!(sel.matches_labels(&obj()));

        let Ok(sel) = Selector::parse_labels("!app") else {
            panic!("selector must parse");
        };
        assert!(!sel.matches_labels(&obj()));
    }

    #[test]
    fn field_selectors_walk_the_body() {
        let Ok(sel) = Selector::parse_fields("metadata.namespace=prod,status.phase=Running") else {
            panic!("selector must parse");
        };
        assert!(sel.matches_fields(&obj()));

        let Ok(sel) = Selector::parse_fields("metadata.name!=w-1") else {
            panic!("selector must parse");
        };
        assert!(!sel.matches_fields(&obj()));
    }

    #[test]
    fn field_selectors_reject_existence() {
        assert_eq!(
            Selector::parse_fields("metadata.name"),
            Err(SelectorError::Unsupported("metadata.name".to_string()))
        );
    }

    #[test]
    fn set_based_clauses_are_rejected() {
        assert!(Selector::parse_labels("env in (prod)").is_err());
        assert!(matches!(
            Selector::parse_labels("=x"),
            Err(SelectorError::EmptyKey(_))
        ));
    }

    #[test]
    fn display_round_trips_canonical_form() {
        let Ok(sel) = Selector::parse_labels("a==1,b!=2,c,!d") else {
            panic!("selector must parse");
        };
        assert_eq!(sel.to_string(), "a=1,b!=2,c,!d");
    }
}
