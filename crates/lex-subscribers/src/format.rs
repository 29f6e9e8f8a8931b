// Registry file format: one `id-HH:MM` per line.
//
// The time is whatever follows the last `-`. It is stored as text and only
// ever compared for equality, so an entry edited by hand into something like
// `09:3` stays in the file and simply never matches a tick.

use serde::{Deserialize, Serialize};

use crate::TimeOfDay;

/// One stored subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    /// Raw time text as stored.
    pub time: String,
}

impl Subscriber {
    pub fn new(id: impl Into<String>, time: TimeOfDay) -> Self {
        Self {
            id: id.into(),
            time: time.to_string(),
        }
    }

    /// Exact match against a tick's `HH:MM`.
    pub fn is_due(&self, at: TimeOfDay) -> bool {
        self.time == at.to_string()
    }
}

/// A line of the registry file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Entry(Subscriber),
    /// Not `id-time`; carried through rewrites untouched.
    Unparsed(String),
}

pub fn parse_line(raw: &str) -> Option<Line> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }
    Some(match line.rsplit_once('-') {
        Some((id, time)) if !id.is_empty() => Line::Entry(Subscriber {
            id: id.to_string(),
            time: time.to_string(),
        }),
        _ => Line::Unparsed(line.to_string()),
    })
}

pub fn parse_file(text: &str) -> Vec<Line> {
    text.lines().filter_map(parse_line).collect()
}

pub fn render_file(lines: &[Line]) -> String {
    let mut out = String::new();
    for l in lines {
        match l {
            Line::Entry(s) => {
                out.push_str(&s.id);
                out.push('-');
                out.push_str(&s.time);
            }
            Line::Unparsed(raw) => out.push_str(raw),
        }
        out.push('\n');
    }
    out
}
