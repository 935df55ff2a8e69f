//! Folder index
//!
//! One index per (folder, locale, timezone) triple: messages sorted by
//! timestamp with stable tie-break, box-serials 1..N in sort order,
//! per-calendar-day serials and counts (the day computed in the index
//! timezone), and a memoized per-program format-evaluation cache used for
//! filename uniqueness testing.
//!
//! Ordering and serials are fixed once built; mutating the underlying
//! folder afterwards is not supported (no incremental update). The run
//! model is single-threaded — the lazily built format cache lives in a
//! `RefCell`, and a concurrent re-implementation would have to guard both
//! index construction and cache population with mutual exclusion.

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::format::FormatProgram;
use crate::message::Message;
use chrono::{DateTime, Locale, NaiveDate, Utc};
use chrono_tz::Tz;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Identity of a folder index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    /// Folder path
    pub folder: PathBuf,
    /// Locale name as given by the caller
    pub locale: String,
    /// Timezone name as given by the caller
    pub timezone: String,
}

/// One indexed message with its assigned serials
#[derive(Debug)]
struct Entry {
    message: Message,
    box_serial: u32,
    day_serial: u32,
    day_count: u32,
    day: NaiveDate,
}

/// Per-program evaluation cache
#[derive(Debug)]
struct FormatCache {
    /// False when the program carries page codes, whose values were
    /// sentinels; inexact strings are only good for uniqueness testing
    exact: bool,
    /// Rendered string per message, in index order
    strings: Vec<String>,
    /// Rendered strings that occurred more than once, with their counts
    duplicates: HashMap<String, u32>,
}

/// Index of one mail folder under one locale/timezone
pub struct FolderIndex {
    key: IndexKey,
    locale: Locale,
    tz: Tz,
    entries: Vec<Entry>,
    caches: RefCell<HashMap<u64, FormatCache>>,
}

impl FolderIndex {
    /// Build the index: sort, assign box-serials, then two day passes
    /// (running day-serial first, whole-day count second).
    fn build(key: IndexKey, locale: Locale, tz: Tz, messages: Vec<Message>) -> Self {
        let total = messages.len();
        let mut order: Vec<usize> = (0..total).collect();
        order.sort_by_key(|&i| messages[i].timestamp);

        let mut sorted: Vec<Option<Message>> = messages.into_iter().map(Some).collect();
        let mut entries = Vec::with_capacity(total);
        let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();

        for (pos, &orig) in order.iter().enumerate() {
            let message = sorted[orig].take().unwrap_or_default();
            let day = calendar_day(message.timestamp, tz);
            let running = per_day.entry(day).or_insert(0);
            *running += 1;
            entries.push(Entry {
                message,
                box_serial: u32::try_from(pos + 1).unwrap_or(u32::MAX),
                day_serial: *running,
                day_count: 0,
                day,
            });
        }
        // day-count is a whole-day property, only known after the first pass
        for entry in &mut entries {
            entry.day_count = per_day[&entry.day];
        }

        debug!(folder = %key.folder.display(), messages = total, "folder index built");
        Self {
            key,
            locale,
            tz,
            entries,
            caches: RefCell::new(HashMap::new()),
        }
    }

    /// Identity this index was built under
    #[must_use]
    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    /// Locale the index renders under
    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Timezone calendar days were computed in
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Messages in ascending timestamp order
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    /// Filtered view of the messages, sort order preserved
    pub fn messages_where<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a Message>
    where
        P: Fn(&Message) -> bool + 'a,
    {
        self.messages().filter(move |m| predicate(m))
    }

    /// Whether the exact message (by identity) is part of this index
    #[must_use]
    pub fn contains(&self, message: &Message) -> bool {
        self.position_of(message).is_some()
    }

    /// Like [`contains`](Self::contains), additionally requiring the
    /// predicate to hold for the message
    #[must_use]
    pub fn contains_where<P>(&self, message: &Message, predicate: P) -> bool
    where
        P: Fn(&Message) -> bool,
    {
        self.position_of(message)
            .is_some_and(|pos| predicate(&self.entries[pos].message))
    }

    /// Total number of messages in the folder
    #[must_use]
    pub fn box_count(&self) -> u32 {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    /// 1-based position in the whole folder, ascending by timestamp
    #[must_use]
    pub fn box_serial(&self, message: &Message) -> Option<u32> {
        self.position_of(message).map(|p| self.entries[p].box_serial)
    }

    /// 1-based position within the message's calendar day
    #[must_use]
    pub fn day_serial(&self, message: &Message) -> Option<u32> {
        self.position_of(message).map(|p| self.entries[p].day_serial)
    }

    /// Total messages sharing the message's calendar day
    #[must_use]
    pub fn day_count(&self, message: &Message) -> Option<u32> {
        self.position_of(message).map(|p| self.entries[p].day_count)
    }

    /// Largest day-count in the folder, the auto-width maximum for the
    /// day-serial category
    #[must_use]
    pub fn max_day_count(&self) -> u32 {
        self.entries.iter().map(|e| e.day_count).max().unwrap_or(0)
    }

    /// Evaluate a program for every message and memoize the result.
    ///
    /// # Errors
    ///
    /// Propagates render failures (these cannot occur for programs whose
    /// serial codes are the only context-dependent codes, since the index
    /// itself backs them).
    pub fn cache_format(&self, program: &FormatProgram) -> Result<(), RenderError> {
        if self.caches.borrow().contains_key(&program.id()) {
            return Ok(());
        }

        let exact = program.flags().page_refs == 0;
        let mut strings = Vec::with_capacity(self.entries.len());
        let mut counts: HashMap<String, u32> = HashMap::new();
        for entry in &self.entries {
            let ctx = RenderContext::new(self.locale, self.tz, &entry.message).with_index(self);
            let rendered = program.render(&ctx)?;
            *counts.entry(rendered.clone()).or_insert(0) += 1;
            strings.push(rendered);
        }
        let duplicates: HashMap<String, u32> =
            counts.into_iter().filter(|&(_, n)| n > 1).collect();

        debug!(
            template = program.template(),
            exact,
            duplicates = duplicates.len(),
            "format cache populated"
        );
        self.caches.borrow_mut().insert(
            program.id(),
            FormatCache {
                exact,
                strings,
                duplicates,
            },
        );
        Ok(())
    }

    /// True iff the program renders a distinct string for every message.
    /// Builds the cache on first use; repeated calls are memoized and do
    /// not re-evaluate the program.
    ///
    /// # Errors
    ///
    /// Propagates render failures from cache population.
    pub fn is_unique(&self, program: &FormatProgram) -> Result<bool, RenderError> {
        self.cache_format(program)?;
        Ok(self.caches.borrow()[&program.id()].duplicates.is_empty())
    }

    /// Cached rendering of `program` for `message`, only when the cache
    /// for that program exists and is exact. Inexact caches (sentinel page
    /// values) are never handed out as output; the caller must evaluate
    /// directly.
    #[must_use]
    pub fn format_in_cache(&self, program: &FormatProgram, message: &Message) -> Option<String> {
        let caches = self.caches.borrow();
        let cache = caches.get(&program.id()).filter(|c| c.exact)?;
        let pos = self.position_of(message)?;
        cache.strings.get(pos).cloned()
    }

    /// Position by reference identity within this index's storage
    fn position_of(&self, message: &Message) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| std::ptr::eq(&e.message, message))
    }
}

impl std::fmt::Debug for FolderIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderIndex")
            .field("key", &self.key)
            .field("messages", &self.entries.len())
            .field("cached_programs", &self.caches.borrow().len())
            .finish()
    }
}

/// Calendar day of an epoch timestamp in a timezone
fn calendar_day(timestamp: i64, tz: Tz) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .with_timezone(&tz)
        .date_naive()
}

/// Explicit registry mapping index keys to shared index instances.
///
/// Owned by the top-level driver; re-requesting a key returns the same
/// instance. Replaces the memoized global singleton of older designs —
/// there is no implicit global state.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: HashMap<IndexKey, Rc<FolderIndex>>,
}

impl IndexRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `key`, building it from `load` on first
    /// request. `load` is not called when the index already exists.
    pub fn get_or_build<F>(
        &mut self,
        key: IndexKey,
        locale: Locale,
        tz: Tz,
        load: F,
    ) -> Rc<FolderIndex>
    where
        F: FnOnce() -> Vec<Message>,
    {
        if let Some(existing) = self.indexes.get(&key) {
            return Rc::clone(existing);
        }
        let index = Rc::new(FolderIndex::build(key.clone(), locale, tz, load()));
        self.indexes.insert(key, Rc::clone(&index));
        index
    }

    /// Number of indexes built so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether no index has been built yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Mailbox;

    const DAY: i64 = 86_400;
    // 2015-03-02T00:00:00Z
    const BASE: i64 = 1_425_254_400;

    fn msg(ts: i64, subject: &str) -> Message {
        Message {
            timestamp: ts,
            subject: Some(subject.to_string()),
            from: vec![Mailbox {
                name: Some("Jane Doe".to_string()),
                address: "jane@example.com".to_string(),
            }],
            ..Message::default()
        }
    }

    fn key() -> IndexKey {
        IndexKey {
            folder: PathBuf::from("/mail/inbox"),
            locale: "POSIX".to_string(),
            timezone: "UTC".to_string(),
        }
    }

    fn build(messages: Vec<Message>) -> Rc<FolderIndex> {
        let mut registry = IndexRegistry::new();
        registry.get_or_build(key(), Locale::POSIX, Tz::UTC, || messages)
    }

    #[test]
    fn test_box_serials_follow_timestamp_order() {
        // deliberately out of order
        let index = build(vec![
            msg(BASE + 300, "third"),
            msg(BASE + 100, "first"),
            msg(BASE + 200, "second"),
        ]);
        let subjects: Vec<_> = index
            .messages()
            .map(|m| m.subject.clone().unwrap())
            .collect();
        assert_eq!(subjects, vec!["first", "second", "third"]);

        let serials: Vec<_> = index
            .messages()
            .map(|m| index.box_serial(m).unwrap())
            .collect();
        assert_eq!(serials, vec![1, 2, 3]);
        assert_eq!(index.box_count(), 3);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let index = build(vec![msg(BASE, "a"), msg(BASE, "b"), msg(BASE, "c")]);
        let subjects: Vec<_> = index
            .messages()
            .map(|m| m.subject.clone().unwrap())
            .collect();
        assert_eq!(subjects, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_day_serials_and_counts() {
        let index = build(vec![
            msg(BASE + 100, "d1-1"),
            msg(BASE + 200, "d1-2"),
            msg(BASE + DAY + 100, "d2-1"),
            msg(BASE + DAY + 200, "d2-2"),
            msg(BASE + DAY + 300, "d2-3"),
        ]);
        let data: Vec<_> = index
            .messages()
            .map(|m| (index.day_serial(m).unwrap(), index.day_count(m).unwrap()))
            .collect();
        assert_eq!(data, vec![(1, 2), (2, 2), (1, 3), (2, 3), (3, 3)]);
        assert_eq!(index.max_day_count(), 3);
    }

    #[test]
    fn test_day_boundary_respects_timezone() {
        // 23:30 UTC on day one is already day two in UTC+1
        let late = BASE + DAY - 1800;
        let mut registry = IndexRegistry::new();
        let index = registry.get_or_build(
            IndexKey {
                timezone: "Europe/Berlin".to_string(),
                ..key()
            },
            Locale::POSIX,
            chrono_tz::Europe::Berlin,
            || vec![msg(late, "late"), msg(BASE + DAY + 100, "next")],
        );
        let first = index.messages().next().unwrap();
        let second = index.messages().nth(1).unwrap();
        assert_eq!(index.day_serial(first), Some(1));
        assert_eq!(index.day_serial(second), Some(2));
        assert_eq!(index.day_count(first), Some(2));
    }

    #[test]
    fn test_registry_returns_same_instance() {
        let mut registry = IndexRegistry::new();
        let a = registry.get_or_build(key(), Locale::POSIX, Tz::UTC, || vec![msg(BASE, "x")]);
        let b = registry.get_or_build(key(), Locale::POSIX, Tz::UTC, || {
            panic!("loader must not run for an existing key")
        });
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_messages_where_preserves_order() {
        let index = build(vec![
            msg(BASE + 1, "keep-1"),
            msg(BASE + 2, "drop"),
            msg(BASE + 3, "keep-2"),
        ]);
        let kept: Vec<_> = index
            .messages_where(|m| m.subject.as_deref().unwrap().starts_with("keep"))
            .map(|m| m.subject.clone().unwrap())
            .collect();
        assert_eq!(kept, vec!["keep-1", "keep-2"]);
    }

    #[test]
    fn test_contains_is_identity_based() {
        let index = build(vec![msg(BASE, "here")]);
        let inside = index.messages().next().unwrap();
        assert!(index.contains(inside));
        assert!(index.contains_where(inside, |m| m.subject.is_some()));
        assert!(!index.contains_where(inside, |m| m.subject.is_none()));

        let outside = msg(BASE, "here");
        assert!(!index.contains(&outside));
    }

    #[test]
    fn test_is_unique_true_for_distinct_strings() {
        let index = build(vec![msg(BASE + 1, "a"), msg(BASE + 2, "b")]);
        let program = FormatProgram::compile("@u").unwrap();
        assert!(index.is_unique(&program).unwrap());
        // memoized: second call answers from the cache
        assert!(index.is_unique(&program).unwrap());
    }

    #[test]
    fn test_is_unique_false_on_collisions() {
        let index = build(vec![msg(BASE + 1, "same"), msg(BASE + 2, "same")]);
        let program = FormatProgram::compile("@u").unwrap();
        assert!(!index.is_unique(&program).unwrap());
    }

    #[test]
    fn test_format_in_cache_exact_only() {
        let index = build(vec![msg(BASE + 1, "a"), msg(BASE + 2, "b")]);
        let exact = FormatProgram::compile("@u-@i").unwrap();
        index.cache_format(&exact).unwrap();
        let first = index.messages().next().unwrap();
        assert_eq!(index.format_in_cache(&exact, first).unwrap(), "a-1");

        // a program with page codes renders sentinels; its cache is inexact
        // and must never be handed out
        let paged = FormatProgram::compile("@u-@p").unwrap();
        index.cache_format(&paged).unwrap();
        assert!(index.format_in_cache(&paged, first).is_none());
    }

    #[test]
    fn test_format_in_cache_requires_prior_population() {
        let index = build(vec![msg(BASE, "a")]);
        let program = FormatProgram::compile("@u").unwrap();
        let first = index.messages().next().unwrap();
        assert!(index.format_in_cache(&program, first).is_none());
    }

    #[test]
    fn test_serial_example_from_daily_folder() {
        // 3rd-by-timestamp message of a 5-message day, sent 2015-03-02
        let index = build(vec![
            msg(BASE + 100, "one"),
            msg(BASE + 200, "two"),
            msg(BASE + 300, "three"),
            msg(BASE + 400, "four"),
            msg(BASE + 500, "five"),
        ]);
        let program = FormatProgram::compile("%Y-%m-%d_@3n_@F_mail").unwrap();
        let third = index.messages().nth(2).unwrap();
        let ctx = RenderContext::new(Locale::POSIX, Tz::UTC, third).with_index(&index);
        assert_eq!(program.render(&ctx).unwrap(), "2015-03-02_3_Jane_Doe_mail");
    }
}
