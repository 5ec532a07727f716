//! Named assertions against a response
//!
//! Each predicate returns a [`Check`] carrying its name, outcome and, when it
//! failed, a short diagnostic. Checks are collected into a cycle report and
//! folded into the `checks` rate and the per-check tallies when recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one named assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    fn from_bool(name: String, passed: bool, detail: impl FnOnce() -> String) -> Self {
        if passed {
            Self::pass(name)
        } else {
            Self::fail(name, detail())
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.detail, self.passed) {
            (_, true) => write!(f, "✓ {}", self.name),
            (Some(detail), false) => write!(f, "✗ {} ({})", self.name, detail),
            (None, false) => write!(f, "✗ {}", self.name),
        }
    }
}

/// `<step>: status <expected>`
pub fn status_is(step: &str, actual: u16, expected: u16) -> Check {
    Check::from_bool(
        format!("{}: status {}", step, expected),
        actual == expected,
        || format!("got {}", actual),
    )
}

/// `<step>: has <field>`
pub fn has_field<T>(step: &str, field: &str, value: Option<&T>) -> Check {
    Check::from_bool(format!("{}: has {}", step, field), value.is_some(), || {
        "field missing or response not parseable".to_string()
    })
}

/// `<step>: <what> matches`
pub fn matches<T: PartialEq + fmt::Debug + ?Sized>(
    step: &str,
    what: &str,
    actual: Option<&T>,
    expected: &T,
) -> Check {
    Check::from_bool(
        format!("{}: {} matches", step, what),
        actual == Some(expected),
        || match actual {
            Some(actual) => format!("expected {:?}, got {:?}", expected, actual),
            None => "nothing to compare".to_string(),
        },
    )
}

/// `<step>: <label>`, passing when `actual` equals `expected`
pub fn value_is<T: PartialEq + fmt::Debug + ?Sized>(
    step: &str,
    label: &str,
    actual: Option<&T>,
    expected: &T,
) -> Check {
    Check::from_bool(format!("{}: {}", step, label), actual == Some(expected), || match actual {
        Some(actual) => format!("got {:?}", actual),
        None => "field missing or response not parseable".to_string(),
    })
}

/// True when every check passed
pub fn all_passed(checks: &[Check]) -> bool {
    checks.iter().all(|check| check.passed)
}
