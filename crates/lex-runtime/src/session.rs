// Per-caller ephemeral state: paging window, active keyword, last rendered
// page reference. Nothing here is persisted.
//
// One map behind one short-held mutex. The lock is never held across an
// `.await`, so callers do not contend beyond a map lookup. Two concurrent
// requests from the same caller are last-writer-wins on the window.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Prev,
}

/// Half-open window `[start, end)` over the match list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: u32,
    pub end: u32,
    pub page_size: u32,
}

impl Window {
    pub fn first(page_size: u32) -> Self {
        Self {
            start: 0,
            end: page_size,
            page_size,
        }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move one page towards `dir` given the current match count, or `None`
    /// when already at that edge.
    ///
    /// Forward requires `end < total` and clamps the new end to `total`. The
    /// new start is the old end, so a page clamped short is followed by the
    /// matches right after it when the set has grown meanwhile.
    /// Backward requires `start > 0`; the new end is the old start.
    pub fn advance(&self, dir: Direction, total: u64) -> Option<Window> {
        match dir {
            Direction::Next if u64::from(self.end) < total => {
                let start = self.end.min(self.start.saturating_add(self.page_size));
                let end = u64::from(start.saturating_add(self.page_size)).min(total) as u32;
                Some(Window {
                    start,
                    end,
                    page_size: self.page_size,
                })
            }
            Direction::Prev if self.start > 0 => Some(Window {
                start: self.start.saturating_sub(self.page_size),
                end: self.start,
                page_size: self.page_size,
            }),
            _ => None,
        }
    }
}

/// Spaces removed and ASCII lower-cased, the same folding the mirror applies
/// to entity names (`lower(replace(name, ' ', ''))`). Blank means no filter.
pub fn normalize_keyword(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    let kw: String = raw
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    Some(kw)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerSession {
    pub window: Window,
    pub keyword: Option<String>,
    /// Reference of the last page rendered for this caller.
    pub last_rendered: Option<u64>,
}

impl CallerSession {
    fn fresh(page_size: u32) -> Self {
        Self {
            window: Window::first(page_size),
            keyword: None,
            last_rendered: None,
        }
    }
}

#[derive(Debug)]
pub struct SessionStore {
    page_size: u32,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, CallerSession>,
    next_ref: u64,
}

impl SessionStore {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Create the caller's session if it does not exist. Idempotent.
    pub fn register(&self, caller: &str) {
        let page_size = self.page_size;
        self.inner
            .lock()
            .sessions
            .entry(caller.to_string())
            .or_insert_with(|| CallerSession::fresh(page_size));
    }

    pub fn get(&self, caller: &str) -> Option<CallerSession> {
        self.inner.lock().sessions.get(caller).cloned()
    }

    /// Window back to `[0, page_size)`, last rendered reference cleared,
    /// keyword replaced.
    pub fn reset(&self, caller: &str, keyword: Option<String>) -> CallerSession {
        let mut s = CallerSession::fresh(self.page_size);
        s.keyword = keyword;
        self.inner
            .lock()
            .sessions
            .insert(caller.to_string(), s.clone());
        s
    }

    /// Store `window` as the caller's current window.
    pub fn set_window(&self, caller: &str, window: Window) {
        let page_size = self.page_size;
        self.inner
            .lock()
            .sessions
            .entry(caller.to_string())
            .or_insert_with(|| CallerSession::fresh(page_size))
            .window = window;
    }

    /// Allocate a new page reference and record it as the caller's last
    /// rendered page.
    pub fn mark_rendered(&self, caller: &str) -> u64 {
        let page_size = self.page_size;
        let mut inner = self.inner.lock();
        inner.next_ref += 1;
        let r = inner.next_ref;
        inner
            .sessions
            .entry(caller.to_string())
            .or_insert_with(|| CallerSession::fresh(page_size))
            .last_rendered = Some(r);
        r
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(start: u32, end: u32) -> Window {
        Window {
            start,
            end,
            page_size: 20,
        }
    }

    #[test]
    fn next_past_total_is_noop_and_prev_goes_back_a_page() {
        let win = w(20, 40);
        assert_eq!(win.advance(Direction::Next, 25), None);
        assert_eq!(win.advance(Direction::Prev, 25), Some(w(0, 20)));
    }

    #[test]
    fn next_clamps_end_to_total() {
        assert_eq!(w(0, 20).advance(Direction::Next, 25), Some(w(20, 25)));
        // From a clamped window, prev restores a full page.
        assert_eq!(w(20, 25).advance(Direction::Prev, 25), Some(w(0, 20)));
    }

    #[test]
    fn next_after_a_clamped_page_continues_at_its_end() {
        // [20,25) was the last page of 25; the match set has since grown to 60.
        assert_eq!(w(20, 25).advance(Direction::Next, 60), Some(w(25, 45)));
        assert_eq!(w(25, 45).advance(Direction::Next, 60), Some(w(45, 60)));
    }

    #[test]
    fn first_page_cannot_go_back() {
        assert_eq!(Window::first(20).advance(Direction::Prev, 100), None);
        assert_eq!(Window::first(20).advance(Direction::Next, 0), None);
    }

    #[test]
    fn shrunk_result_set_blocks_next() {
        // Window opened over 100 matches; the mirror now has 30.
        assert_eq!(w(40, 60).advance(Direction::Next, 30), None);
        assert_eq!(w(40, 60).advance(Direction::Prev, 30), Some(w(20, 40)));
    }

    #[test]
    fn keyword_is_lowercased_without_spaces() {
        assert_eq!(normalize_keyword(Some(" Kepler 22 ")), Some("kepler22".into()));
        assert_eq!(normalize_keyword(Some("   ")), None);
        assert_eq!(normalize_keyword(Some(" \t ")), None);
        assert_eq!(normalize_keyword(None), None);
    }

    #[test]
    fn keyword_folding_matches_the_store() {
        // SQLite's lower() leaves non-ASCII letters and tabs alone.
        assert_eq!(normalize_keyword(Some("ÉTOILE 7")), Some("Étoile7".into()));
        assert_eq!(normalize_keyword(Some("a\tB")), Some("a\tb".into()));
    }

    #[test]
    fn register_is_idempotent_and_reset_clears() {
        let store = SessionStore::new(25);
        store.register("a");
        store.set_window(
            "a",
            Window {
                start: 25,
                end: 50,
                page_size: 25,
            },
        );
        store.mark_rendered("a");
        store.register("a");
        assert_eq!(store.get("a").unwrap().window.start, 25);
        assert_eq!(store.len(), 1);

        let s = store.reset("a", Some("k2".into()));
        assert_eq!(s.window, Window::first(25));
        assert_eq!(s.last_rendered, None);
        assert_eq!(store.get("a").unwrap().keyword.as_deref(), Some("k2"));
    }

    #[test]
    fn page_references_are_unique_across_callers() {
        let store = SessionStore::new(10);
        let a = store.mark_rendered("a");
        let b = store.mark_rendered("b");
        assert_ne!(a, b);
        assert_eq!(store.get("b").unwrap().last_rendered, Some(b));
    }
}
