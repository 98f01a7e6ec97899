//! Conversation persistence
//!
//! The conversation is an append-only list of messages, mirrored to
//! durable storage after every mutation. Storage is an injected
//! capability so the store can be tested without touching the real
//! config directory. Every failure here recovers locally: a bad read
//! falls back to a freshly seeded conversation, a bad write is logged
//! and in-memory state advances anyway. The caller always ends up with
//! a renderable, non-empty conversation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::state::ChatMessage;

/// Storage slot holding the serialized conversation
pub const STORAGE_KEY: &str = "chat_messages";

/// Greeting shown when no prior conversation exists
pub const GREETING: &str =
    "Hello! I'm your coding assistant. What can I help you with today? 💻✨";

/// Notice left behind after a reset
pub const RESET_NOTICE: &str =
    "Chat reset! Ready to help with your next coding question. 🖥️";

/// User-facing reply substituted when the completion request fails
pub const COMPLETION_FALLBACK: &str =
    "Sorry, something went wrong. Please try again. 🛠️";

/// Durable key-value storage capability
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed storage: one `<key>.json` file per slot
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn default_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("codetalk"))
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }
}

/// Owner of the conversation lifecycle: restore, append, reset, persist
pub struct ConversationStore<S: Storage> {
    storage: S,
}

impl<S: Storage> ConversationStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Restore the persisted conversation, seeding a greeting when the
    /// slot is missing, unreadable, corrupt, or empty. The seed is
    /// persisted immediately so the next load sees the same thing.
    pub fn load(&self) -> Vec<ChatMessage> {
        let stored = match self.storage.get(STORAGE_KEY) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("failed to read stored conversation: {e:#}");
                None
            }
        };

        if let Some(text) = stored {
            match serde_json::from_str::<Vec<ChatMessage>>(&text) {
                Ok(messages) if !messages.is_empty() => return messages,
                Ok(_) => tracing::debug!("stored conversation is empty, reseeding"),
                Err(e) => tracing::warn!("stored conversation is corrupt, reseeding: {e}"),
            }
        }

        self.seed(GREETING)
    }

    /// Append a message and persist the full conversation
    pub fn append(&self, conversation: &mut Vec<ChatMessage>, message: ChatMessage) {
        conversation.push(message);
        self.persist(conversation);
    }

    /// Append the outcome of a completion request. A failure becomes the
    /// fixed fallback message; the raw error is only logged.
    pub fn record_reply(&self, conversation: &mut Vec<ChatMessage>, reply: Result<String>) {
        let content = match reply {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("completion request failed: {e:#}");
                COMPLETION_FALLBACK.to_string()
            }
        };
        self.append(conversation, ChatMessage::assistant(content));
    }

    /// Discard the conversation, returning and persisting a fresh
    /// single-message one
    pub fn reset(&self) -> Vec<ChatMessage> {
        self.seed(RESET_NOTICE)
    }

    /// Mirror the conversation to durable storage. Write failures are
    /// logged and swallowed; in-memory state has already advanced.
    pub fn persist(&self, conversation: &[ChatMessage]) {
        let serialized = match serde_json::to_string(conversation) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!("failed to serialize conversation: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set(STORAGE_KEY, &serialized) {
            tracing::warn!("failed to persist conversation: {e:#}");
        }
    }

    fn seed(&self, content: &str) -> Vec<ChatMessage> {
        let conversation = vec![ChatMessage::assistant(content)];
        self.persist(&conversation);
        conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChatRole;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct MemoryStorage {
        slots: RefCell<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                slots: RefCell::new(HashMap::new()),
            }
        }

        fn preloaded(value: &str) -> Self {
            let storage = Self::new();
            storage
                .slots
                .borrow_mut()
                .insert(STORAGE_KEY.to_string(), value.to_string());
            storage
        }
    }

    impl Storage for MemoryStorage {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.slots.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.slots
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    /// Storage that always fails, for exercising the fail-soft paths
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(FileStorage::new(dir.path()).unwrap());

        let mut conversation = vec![
            ChatMessage::assistant(GREETING),
            ChatMessage::user("how do I reverse a list in python?"),
            ChatMessage::assistant("Use `reversed(xs)` or `xs[::-1]`."),
        ];
        store.persist(&conversation);

        assert_eq!(store.load(), conversation);

        // Round-trip still holds after further appends
        store.append(&mut conversation, ChatMessage::user("thanks!"));
        assert_eq!(store.load(), conversation);
    }

    #[test]
    fn load_on_empty_storage_seeds_a_greeting() {
        let store = ConversationStore::new(MemoryStorage::new());

        let conversation = store.load();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, ChatRole::Assistant);
        assert_eq!(conversation[0].content, GREETING);

        // Seeding persisted, so a second load returns the identical
        // conversation instead of reseeding from scratch.
        assert_eq!(store.load(), conversation);
    }

    #[test]
    fn load_on_corrupt_storage_seeds_a_greeting() {
        for garbage in ["not json at all", "{\"role\":\"user\"}", "[]", "42"] {
            let store = ConversationStore::new(MemoryStorage::preloaded(garbage));
            let conversation = store.load();
            assert_eq!(conversation.len(), 1, "input: {garbage}");
            assert_eq!(conversation[0].role, ChatRole::Assistant);
        }
    }

    #[test]
    fn append_one_at_a_time_matches_appending_in_sequence() {
        let m1 = ChatMessage::user("first");
        let m2 = ChatMessage::assistant("second");

        let one_at_a_time = ConversationStore::new(MemoryStorage::new());
        let mut a = one_at_a_time.load();
        one_at_a_time.append(&mut a, m1.clone());
        one_at_a_time.append(&mut a, m2.clone());

        let in_sequence = ConversationStore::new(MemoryStorage::new());
        let mut b = in_sequence.load();
        b.extend([m1, m2]);
        in_sequence.persist(&b);

        assert_eq!(a, b);
        assert_eq!(one_at_a_time.load(), in_sequence.load());
    }

    #[test]
    fn failed_completion_records_the_fallback_not_the_error() {
        let store = ConversationStore::new(MemoryStorage::new());
        let mut conversation = store.load();
        store.append(&mut conversation, ChatMessage::user("write me a quine"));

        store.record_reply(&mut conversation, Err(anyhow!("HTTP 500: secret internals")));

        let last = conversation.last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, COMPLETION_FALLBACK);
        assert!(!last.content.contains("500"));

        // The fallback is what got persisted, too
        assert_eq!(store.load().last().unwrap().content, COMPLETION_FALLBACK);
    }

    #[test]
    fn successful_completion_records_the_reply() {
        let store = ConversationStore::new(MemoryStorage::new());
        let mut conversation = store.load();
        store.append(&mut conversation, ChatMessage::user("hi"));

        store.record_reply(&mut conversation, Ok("hello!".to_string()));

        assert_eq!(conversation.last().unwrap(), &ChatMessage::assistant("hello!"));
    }

    #[test]
    fn reset_always_yields_a_single_message() {
        // Prior length 0 (nothing stored yet)
        let store = ConversationStore::new(MemoryStorage::new());
        assert_eq!(store.reset().len(), 1);

        // Prior length 1
        let store = ConversationStore::new(MemoryStorage::new());
        let _ = store.load();
        assert_eq!(store.reset().len(), 1);

        // Prior length 50
        let store = ConversationStore::new(MemoryStorage::new());
        let mut conversation = store.load();
        for i in 0..49 {
            store.append(&mut conversation, ChatMessage::user(format!("msg {i}")));
        }
        assert_eq!(conversation.len(), 50);
        let fresh = store.reset();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].content, RESET_NOTICE);
        assert_eq!(store.load(), fresh);
    }

    #[test]
    fn broken_storage_never_blocks_in_memory_state() {
        let store = ConversationStore::new(BrokenStorage);

        // Load recovers to a seeded conversation even though both the
        // read and the follow-up seed write fail.
        let mut conversation = store.load();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, ChatRole::Assistant);

        // Appends still advance in memory
        store.append(&mut conversation, ChatMessage::user("still here"));
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last().unwrap().content, "still here");

        assert_eq!(store.reset().len(), 1);
    }
}
