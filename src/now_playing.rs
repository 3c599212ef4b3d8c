use crate::{NowPlayingInfo, Track};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// The most recent now-playing report for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlayingEntry {
    pub player_id: String,
    pub player_name: String,
    pub user_id: String,
    pub username: String,
    pub track: Track,
    /// Wall-clock time the entry was recorded
    pub started_at: DateTime<Utc>,
    /// Assigned by the table on `set`; higher means more recent
    pub seq: u64,
}

impl NowPlayingEntry {
    pub fn new(
        player_id: impl Into<String>,
        player_name: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        track: Track,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            user_id: user_id.into(),
            username: username.into(),
            track,
            started_at: Utc::now(),
            seq: 0,
        }
    }

    /// Project to the shape exposed by `get_now_playing`.
    pub fn to_info(&self) -> NowPlayingInfo {
        NowPlayingInfo {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            track_id: self.track.id.clone(),
            track: self.track.clone(),
            started_at: self.started_at,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, NowPlayingEntry>,
    next_seq: u64,
}

/// Concurrency-safe table holding at most one entry per player.
///
/// Recency is tracked with a sequence counter assigned under the table's lock,
/// so entries list in the order their `set` calls acquired it (latest first).
/// Wall-clock timestamps are only used for expiry.
#[derive(Debug, Default)]
pub struct NowPlayingTable {
    inner: Mutex<Inner>,
    ttl: Option<Duration>,
}

impl NowPlayingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` are dropped the next time the table is listed.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::default(),
            ttl,
        }
    }

    /// Record `entry`, replacing any entry for the same player. Returns the
    /// sequence number assigned to it.
    pub fn set(&self, mut entry: NowPlayingEntry) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_seq += 1;
        entry.seq = inner.next_seq;
        let seq = entry.seq;
        inner.entries.insert(entry.player_id.clone(), entry);
        seq
    }

    /// All live entries, most recently set first.
    pub fn list(&self) -> Vec<NowPlayingEntry> {
        self.list_at(Utc::now())
    }

    /// Like [`list`](Self::list), evaluating expiry against `now`.
    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<NowPlayingEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ttl) = self.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) {
            let before = inner.entries.len();
            inner.entries.retain(|_, e| now.signed_duration_since(e.started_at) < ttl);
            let expired = before - inner.entries.len();
            if expired > 0 {
                log::debug!("Expired {expired} stale now playing entries");
            }
        }

        let mut entries: Vec<NowPlayingEntry> = inner.entries.values().cloned().collect();
        drop(inner);

        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries
    }

    pub fn get(&self, player_id: &str) -> Option<NowPlayingEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(player_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {id}"),
            album: "Album".to_string(),
            artist: "Artist".to_string(),
            album_artist: "Artist".to_string(),
            track_number: 1,
            duration: 180,
            mbz_track_id: None,
        }
    }

    fn entry(player: &str, track_id: &str) -> NowPlayingEntry {
        NowPlayingEntry::new(player, format!("{player}-name"), "u-1", "user-1", track(track_id))
    }

    #[test]
    fn test_last_write_wins_per_player() {
        let table = NowPlayingTable::new();
        table.set(entry("player-1", "123"));
        table.set(entry("player-1", "456"));

        let entries = table.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track.id, "456");
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let table = NowPlayingTable::new();
        table.set(entry("player-1", "1"));
        table.set(entry("player-2", "2"));
        table.set(entry("player-3", "3"));
        table.set(entry("player-1", "4"));

        let players: Vec<String> = table.list().into_iter().map(|e| e.player_id).collect();
        assert_eq!(players, vec!["player-1", "player-3", "player-2"]);
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let table = NowPlayingTable::new();
        let first = table.set(entry("a", "1"));
        let second = table.set(entry("b", "2"));
        assert!(second > first);
        assert_eq!(table.get("b").map(|e| e.seq), Some(second));
    }

    #[test]
    fn test_ttl_expires_stale_entries() {
        let table = NowPlayingTable::with_ttl(Some(Duration::from_secs(60)));
        let mut stale = entry("old", "1");
        stale.started_at = Utc::now() - chrono::Duration::seconds(120);
        table.set(stale);
        table.set(entry("fresh", "2"));

        let players: Vec<String> = table.list().into_iter().map(|e| e.player_id).collect();
        assert_eq!(players, vec!["fresh"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_huge_ttl_keeps_entries() {
        let table = NowPlayingTable::with_ttl(Some(Duration::from_secs(10_000_000_000_000)));
        table.set(entry("player-1", "123"));

        let entries = table.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track.id, "123");
    }

    #[test]
    fn test_without_ttl_entries_persist() {
        let table = NowPlayingTable::new();
        let mut old = entry("old", "1");
        old.started_at = Utc::now() - chrono::Duration::days(30);
        table.set(old);

        assert_eq!(table.list().len(), 1);
    }

    #[test]
    fn test_concurrent_sets_keep_one_entry_per_player() {
        let table = Arc::new(NowPlayingTable::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        table.set(entry(&format!("player-{}", i % 4), &format!("{i}-{j}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = table.list();
        assert_eq!(entries.len(), 4);
        let mut seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        seqs.dedup();
        assert_eq!(seqs.len(), 4);
    }
}
