//! Output parsers for `fail2ban-client`.
//!
//! The tool prints a tree of `key: value` lines with no formal grammar, e.g.
//!
//! ```text
//! Status
//! |- Number of jail:	2
//! `- Jail list:	sshd, nginx
//! ```
//!
//! Parsing is line-oriented with an explicit [`Section`] state so each edge
//! case has a named place to live.

use super::types::{Fields, StatusRecord};

/// Line that opens the jail section of `status` output
pub const JAIL_SECTION_MARKER: &str = "Status for the jail:";

/// Key of the line that lists jail names
pub const JAIL_LIST_KEY: &str = "Jail list";

/// Parser state for overview output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Before any jail marker; bare lines are headings and ignored
    Idle,
    /// After a jail marker; bare lines are jail names
    InJailSection,
}

/// Strip whitespace and the tree-drawing prefix (`|-`, `` `- ``, `|  |-`).
pub fn clean_line(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches(|c: char| matches!(c, '|' | '`' | '-') || c.is_whitespace())
        .trim_end()
}

/// Split at the first colon into trimmed key and value.
pub fn split_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Comma-separated jail names, trimmed, empties dropped
pub fn split_names(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}

/// Parse `status` output into summary fields and the jail list.
pub fn parse_status(output: &str) -> StatusRecord {
    let mut record = StatusRecord::default();
    let mut section = Section::Idle;

    for raw in output.lines() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        if line == JAIL_SECTION_MARKER {
            section = Section::InJailSection;
            continue;
        }

        match split_field(line) {
            Some((key, value)) => {
                if key == JAIL_LIST_KEY {
                    section = Section::InJailSection;
                    record.jails.extend(split_names(value));
                }
                record.fields.insert(key.to_string(), value.to_string());
            }
            None if section == Section::InJailSection => {
                record.jails.extend(split_names(line));
            }
            None => {}
        }
    }

    record
}

/// Parse `status` output into jail names only.
///
/// Either marker opens the list; names may sit on the marker line itself or
/// on the following lines. `key: value` lines inside the section are summary
/// fields, not names.
pub fn parse_jail_list(output: &str) -> Vec<String> {
    let mut jails = Vec::new();
    let mut section = Section::Idle;

    for raw in output.lines() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        if line == JAIL_SECTION_MARKER {
            section = Section::InJailSection;
            continue;
        }

        if let Some((key, value)) = split_field(line) {
            if key == JAIL_LIST_KEY {
                section = Section::InJailSection;
                jails.extend(split_names(value));
            }
            continue;
        }

        if section == Section::InJailSection {
            jails.extend(split_names(line));
        }
    }

    jails
}

/// Parse `status <jail>` output: every `key: value` line becomes a field.
pub fn parse_fields(output: &str) -> Fields {
    output
        .lines()
        .map(clean_line)
        .filter_map(split_field)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Parse `get <jail> banned` output.
///
/// One address per line; newer fail2ban prints a Python-style list
/// (`['192.0.2.1', '192.0.2.2']`) which is unpacked too. Addresses are not
/// validated on read.
pub fn parse_banned(output: &str) -> Vec<String> {
    let trimmed = output.trim();

    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return inner
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
