//! Session registry for uploaded recordings.
//!
//! Each session binds a transcript, its vector index, and a bounded
//! conversation memory under one id. Sessions are created from a
//! transcript, looked up by id, and evicted after a configurable idle
//! TTL. Eviction is lazy on lookup and can also run as a periodic
//! sweep. Nothing is persisted; dropping the store drops everything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use uuid::Uuid;

use recap_core::config::RecapConfig;
use recap_vector::chunker;
use recap_vector::embedding::DynEmbeddingService;
use recap_vector::index::VectorIndex;

use crate::error::ChatError;
use crate::memory::ConversationMemory;
use crate::types::{SessionInfo, Turn};

// =============================================================================
// Session
// =============================================================================

/// One uploaded recording and its conversation state.
///
/// The index and transcript are immutable after creation. Memory is
/// guarded by a mutex; `busy` serializes answer streams so at most one
/// question per session is in flight.
pub struct Session {
    pub id: Uuid,
    transcript: String,
    index: VectorIndex,
    memory: Mutex<ConversationMemory>,
    created_at: i64,
    last_access: AtomicI64,
    busy: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    fn new(id: Uuid, transcript: String, index: VectorIndex, memory_turns: usize) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id,
            transcript,
            index,
            memory: Mutex::new(ConversationMemory::new(memory_turns)),
            created_at: now,
            last_access: AtomicI64::new(now),
            busy: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The full transcript this session was built from.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// The session's vector index over transcript passages.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        self.last_access
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    /// Epoch seconds of the most recent successful lookup.
    pub fn last_access(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Snapshot of recent turns, oldest first.
    pub fn recent_turns(&self) -> Vec<Turn> {
        match self.memory.lock() {
            Ok(memory) => memory.recent(),
            Err(poisoned) => poisoned.into_inner().recent(),
        }
    }

    /// Record a completed turn in conversation memory.
    pub fn append_turn(&self, turn: Turn) {
        match self.memory.lock() {
            Ok(mut memory) => memory.append(turn),
            Err(poisoned) => poisoned.into_inner().append(turn),
        }
    }

    /// Try to claim the session for one answer stream.
    ///
    /// Returns the guard holding the claim, or `SessionBusy` when
    /// another answer is already in flight. The claim is released
    /// when the guard drops.
    pub fn try_claim(&self) -> Result<tokio::sync::OwnedMutexGuard<()>, ChatError> {
        Arc::clone(&self.busy)
            .try_lock_owned()
            .map_err(|_| ChatError::SessionBusy(self.id))
    }

    /// Diagnostic snapshot of the session's state.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            transcription_length: self.transcript.chars().count(),
            passage_count: self.index.len(),
            turn_count: match self.memory.lock() {
                Ok(memory) => memory.len(),
                Err(poisoned) => poisoned.into_inner().len(),
            },
            created_at: self.created_at,
            last_access: self.last_access(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transcript_chars", &self.transcript.chars().count())
            .field("passages", &self.index.len())
            .finish()
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// In-memory registry of live sessions.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    embedder: Arc<dyn DynEmbeddingService>,
    chunk_size: usize,
    overlap: usize,
    ttl_secs: i64,
    memory_turns: usize,
}

impl SessionStore {
    pub fn new(embedder: Arc<dyn DynEmbeddingService>, config: &RecapConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            embedder,
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            ttl_secs: config.session.ttl_secs,
            memory_turns: config.session.memory_turns,
        }
    }

    /// Create a session from a transcription.
    ///
    /// Chunks the text and embeds every chunk before anything becomes
    /// visible; on any failure no session exists. Returns the new
    /// session's id.
    pub async fn create(&self, transcription: &str) -> Result<Uuid, ChatError> {
        let transcript = transcription.trim();
        if transcript.is_empty() {
            return Err(ChatError::EmptyTranscript);
        }

        let chunks = chunker::split(transcript, self.chunk_size, self.overlap)?;
        let index = VectorIndex::build(Arc::clone(&self.embedder), chunks).await?;

        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(
            id,
            transcript.to_string(),
            index,
            self.memory_turns,
        ));

        let expired = {
            let mut sessions = self.lock_sessions();
            let expired = Self::drain_expired(&mut sessions, self.ttl_secs);
            sessions.insert(id, session);
            expired
        };
        if expired > 0 {
            debug!("Evicted {} expired sessions during create", expired);
        }

        info!(session_id = %id, "Session created");
        Ok(id)
    }

    /// Look up a live session and refresh its last-access time.
    ///
    /// An expired session is removed here and reported as not found,
    /// so callers never observe a session past its TTL.
    pub fn get(&self, id: Uuid) -> Result<Arc<Session>, ChatError> {
        let mut sessions = self.lock_sessions();
        let session = sessions
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))?;

        let now = chrono::Utc::now().timestamp();
        if now - session.last_access() > self.ttl_secs {
            sessions.remove(&id);
            debug!(session_id = %id, "Session expired on access");
            return Err(ChatError::SessionNotFound(id));
        }

        session.touch();
        Ok(session)
    }

    /// Remove every session idle past the TTL. Returns how many.
    pub fn sweep(&self) -> usize {
        let removed = {
            let mut sessions = self.lock_sessions();
            Self::drain_expired(&mut sessions, self.ttl_secs)
        };
        if removed > 0 {
            info!("Swept {} expired sessions", removed);
        }
        removed
    }

    /// Diagnostic snapshots of every live session.
    pub fn list_info(&self) -> Vec<SessionInfo> {
        self.lock_sessions().values().map(|s| s.info()).collect()
    }

    /// Number of live sessions, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<Session>>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn drain_expired(sessions: &mut HashMap<Uuid, Arc<Session>>, ttl_secs: i64) -> usize {
        let now = chrono::Utc::now().timestamp();
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_access() <= ttl_secs);
        before - sessions.len()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_vector::embedding::MockEmbedding;

    fn store() -> SessionStore {
        store_with(|_| {})
    }

    fn store_with(adjust: impl FnOnce(&mut RecapConfig)) -> SessionStore {
        let mut config = RecapConfig::default();
        config.chunking.chunk_size = 50;
        config.chunking.overlap = 10;
        adjust(&mut config);
        SessionStore::new(Arc::new(MockEmbedding::new()), &config)
    }

    const TRANSCRIPT: &str =
        "The quarterly review covered revenue, hiring plans, and the new product launch timeline.";

    // ---- Creation ----

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let id = store.create(TRANSCRIPT).await.unwrap();

        let session = store.get(id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.transcript(), TRANSCRIPT);
        assert!(!session.index().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_transcription() {
        let store = store();
        assert!(matches!(
            store.create("").await,
            Err(ChatError::EmptyTranscript)
        ));
        assert!(matches!(
            store.create("   \n\t  ").await,
            Err(ChatError::EmptyTranscript)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_trims_transcription() {
        let store = store();
        let id = store.create("  hello world  ").await.unwrap();
        assert_eq!(store.get(id).unwrap().transcript(), "hello world");
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = store();
        let a = store.create("first recording transcript").await.unwrap();
        let b = store.create("second recording transcript").await.unwrap();
        assert_ne!(a, b);

        store.get(a).unwrap().append_turn(Turn {
            question: "q".to_string(),
            answer: "a".to_string(),
            created_at: 0,
        });
        assert_eq!(store.get(a).unwrap().recent_turns().len(), 1);
        assert!(store.get(b).unwrap().recent_turns().is_empty());
    }

    // ---- Lookup and expiry ----

    #[tokio::test]
    async fn test_get_unknown_id() {
        let store = store();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.get(id),
            Err(ChatError::SessionNotFound(found)) if found == id
        ));
    }

    #[tokio::test]
    async fn test_expired_session_not_found_on_get() {
        let store = store();
        let id = store.create(TRANSCRIPT).await.unwrap();

        // Push last_access into the past, beyond the TTL.
        let session = store.get(id).unwrap();
        session
            .last_access
            .store(chrono::Utc::now().timestamp() - 7200, Ordering::Relaxed);

        assert!(matches!(store.get(id), Err(ChatError::SessionNotFound(_))));
        // Lazy expiry also removed it.
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_get_refreshes_ttl() {
        let store = store_with(|c| c.session.ttl_secs = 100);
        let id = store.create(TRANSCRIPT).await.unwrap();

        let session = store.get(id).unwrap();
        session
            .last_access
            .store(chrono::Utc::now().timestamp() - 90, Ordering::Relaxed);

        // Still live, and the lookup touches it back to now.
        let session = store.get(id).unwrap();
        assert!(chrono::Utc::now().timestamp() - session.last_access() < 5);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = store();
        let stale = store.create("stale transcript").await.unwrap();
        let fresh = store.create("fresh transcript").await.unwrap();

        store
            .get(stale)
            .unwrap()
            .last_access
            .store(chrono::Utc::now().timestamp() - 7200, Ordering::Relaxed);

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(fresh).is_ok());
    }

    #[tokio::test]
    async fn test_sweep_empty_store() {
        assert_eq!(store().sweep(), 0);
    }

    // ---- Busy claim ----

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = store();
        let id = store.create(TRANSCRIPT).await.unwrap();
        let session = store.get(id).unwrap();

        let guard = session.try_claim().unwrap();
        assert!(matches!(
            session.try_claim(),
            Err(ChatError::SessionBusy(busy)) if busy == id
        ));

        drop(guard);
        assert!(session.try_claim().is_ok());
    }

    // ---- Diagnostics ----

    #[tokio::test]
    async fn test_info_snapshot() {
        let store = store();
        let id = store.create(TRANSCRIPT).await.unwrap();
        let session = store.get(id).unwrap();
        session.append_turn(Turn {
            question: "q".to_string(),
            answer: "a".to_string(),
            created_at: 0,
        });

        let infos = store.list_info();
        assert_eq!(infos.len(), 1);
        let info = &infos[0];
        assert_eq!(info.id, id);
        assert_eq!(info.transcription_length, TRANSCRIPT.chars().count());
        assert!(info.passage_count > 1);
        assert_eq!(info.turn_count, 1);
        assert!(info.last_access >= info.created_at);
    }
}
