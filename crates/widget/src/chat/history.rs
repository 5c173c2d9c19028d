use chrono::{DateTime, NaiveDateTime};
use plantae_transport::{ChatHistoryPayload, HistoryRole};

use crate::chat::message::{ChatEntry, EntryId};

const SERVER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Ordered in-memory transcript for one widget instance.
///
/// Entry ids are allocated here and never reused, so an id returned by
/// [`HistoryStore::append`] always names the same logical entry.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<ChatEntry>,
    next_entry_id: u64,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_id(&mut self) -> EntryId {
        let id = EntryId::new(self.next_entry_id);
        self.next_entry_id = self.next_entry_id.saturating_add(1);
        id
    }

    /// Replaces the transcript wholesale.
    pub fn load(&mut self, entries: Vec<ChatEntry>) {
        self.entries = entries;
    }

    /// Loads a server transcript, merging text messages and uploaded images by timestamp.
    pub fn hydrate(&mut self, payload: ChatHistoryPayload) {
        let entries = merge_history(payload, || self.alloc_id());
        tracing::debug!(entries = entries.len(), "hydrated chat history");
        self.load(entries);
    }

    pub fn append(&mut self, entry: ChatEntry) -> EntryId {
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    /// Swaps the entry with `id` for `entry`, keeping its position and id.
    ///
    /// Returns false when no entry with `id` exists.
    pub fn replace(&mut self, id: EntryId, mut entry: ChatEntry) -> bool {
        let Some(slot) = self.entries.iter_mut().find(|existing| existing.id == id) else {
            tracing::debug!(entry_id = id.0, "replace target not found");
            return false;
        };
        entry.id = id;
        *slot = entry;
        true
    }

    pub fn remove(&mut self, id: EntryId) -> Option<ChatEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: EntryId) -> Option<&ChatEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_placeholder(&self) -> bool {
        self.entries.iter().any(ChatEntry::is_placeholder)
    }
}

/// Parses the server's `YYYY-MM-DD HH:MM:SS` timestamps, falling back to ISO 8601.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, SERVER_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, ISO_TIMESTAMP_FORMAT))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|parsed| parsed.naive_utc())
        })
}

/// Builds display entries from a history payload.
///
/// Messages come first, then images, and the result is stably sorted by
/// timestamp. Entries whose timestamp is missing or unparsable sort before
/// all timestamped entries and keep their relative order.
pub fn merge_history(
    payload: ChatHistoryPayload,
    mut alloc_id: impl FnMut() -> EntryId,
) -> Vec<ChatEntry> {
    let mut entries = Vec::with_capacity(payload.messages.len() + payload.images.len());

    for message in payload.messages {
        let timestamp = message.timestamp.as_deref().and_then(parse_timestamp);
        let id = alloc_id();
        let entry = match message.role {
            HistoryRole::User => ChatEntry::user_text(id, message.content),
            HistoryRole::Agent => ChatEntry::agent_text(id, message.content),
        };
        entries.push(entry.with_timestamp(timestamp));
    }

    for image in payload.images {
        let timestamp = image.timestamp.as_deref().and_then(parse_timestamp);
        entries.push(ChatEntry::user_image(alloc_id(), image.url, None).with_timestamp(timestamp));
    }

    // `sort_by_key` is stable and `None` orders before `Some`.
    entries.sort_by_key(|entry| entry.timestamp);
    entries
}
