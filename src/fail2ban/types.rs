//! Records produced by the adapter.
//!
//! Field values are kept as the text fail2ban printed; its formatting is not a
//! stable contract so nothing here is numerically coerced except the
//! best-effort total in [`StatsRecord`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Free-text `key: value` pairs from one tool invocation
pub type Fields = BTreeMap<String, String>;

/// Overall daemon status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub jails: Vec<String>,
    #[serde(flatten)]
    pub fields: Fields,
}

/// One jail with its status fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JailRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Fields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_ips: Option<Vec<String>>,
}

impl JailRecord {
    /// Name-only record, as listed by `GET /jails`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            banned_ips: None,
        }
    }

    /// Record built from `status <jail>` output
    pub fn from_status(name: impl Into<String>, status: Fields) -> Self {
        let banned_ips = status
            .get("Banned IP list")
            .map(|list| list.split_whitespace().map(String::from).collect());

        Self {
            name: name.into(),
            status: Some(status),
            banned_ips,
        }
    }
}

/// Fixed subset of jail status used for statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JailStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currently_banned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_banned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_ips: Option<Vec<String>>,
}

impl JailStats {
    pub fn from_status(status: &Fields) -> Self {
        Self {
            filter: status.get("Filter").cloned(),
            currently_banned: status.get("Currently banned").cloned(),
            total_banned: status.get("Total banned").cloned(),
            banned_ips: status
                .get("Banned IP list")
                .map(|list| list.split_whitespace().map(String::from).collect()),
        }
    }

    /// Currently-banned count; anything non-numeric counts as zero
    pub fn currently_banned_count(&self) -> u64 {
        self.currently_banned
            .as_deref()
            .map(leading_integer)
            .unwrap_or(0)
    }
}

/// Aggregate statistics across all jails
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsRecord {
    pub jail_count: usize,
    pub jails: Vec<String>,
    pub total_banned_ips: u64,
    pub jail_details: BTreeMap<String, JailStats>,
    pub timestamp: i64,
}

/// Parse the leading run of digits, ignoring surrounding whitespace.
fn leading_integer(text: &str) -> u64 {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
