use anyhow::{anyhow, Result};
use codetalk_core::ai::groq::DEFAULT_MODEL;
use codetalk_core::parser::{parse, Segment};
use codetalk_core::state::{ChatMessage, ChatRole};
use codetalk_core::{Config, ConversationStore, FileStorage, GroqClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input line state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation state
    pub messages: Vec<ChatMessage>,
    pub loading: bool,

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // In-flight completion request. The generation counter lets a reset
    // invalidate a request that is still outstanding: a reply coming
    // back under an old generation is dropped instead of being appended
    // to the fresh conversation.
    reply_task: Option<tokio::task::JoinHandle<Result<String>>>,
    reply_generation: u64,
    generation: u64,

    // Collaborators
    pub store: ConversationStore<FileStorage>,
    pub client: Option<GroqClient>,
    pub model: String,
}

impl App {
    pub fn new() -> Result<Self> {
        // Load config
        let config = Config::load().unwrap_or_else(|_| Config::new());

        // API key - check env var first, then config
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .or_else(|| config.api_key.clone());
        let client = api_key.as_deref().map(GroqClient::new);

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let store = ConversationStore::new(FileStorage::new(FileStorage::default_dir()?)?);
        let messages = store.load();

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            messages,
            loading: false,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            reply_task: None,
            reply_generation: 0,
            generation: 0,

            store,
            client,
            model,
        })
    }

    /// Send the current input as a user message and request a reply.
    /// Ignored while a request is already in flight.
    pub fn send_message(&mut self) {
        if self.input.trim().is_empty() || self.loading {
            return;
        }

        let content = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.store
            .append(&mut self.messages, ChatMessage::user(content));
        self.scroll_to_bottom();

        let Some(client) = self.client.clone() else {
            // No API key: leave a fixed notice instead of a request
            self.store.append(
                &mut self.messages,
                ChatMessage::assistant(
                    "No API key configured. Set GROQ_API_KEY or add api_key to the config file.",
                ),
            );
            return;
        };

        // The request carries the entire conversation history
        let model = self.model.clone();
        let history = self.messages.clone();
        self.loading = true;
        self.reply_generation = self.generation;
        self.reply_task = Some(tokio::spawn(async move {
            client.complete(&model, &history).await
        }));
    }

    /// Collect a finished reply, if any. Called from the main loop; the
    /// tick event guarantees we get here shortly after the task ends.
    pub async fn poll_reply(&mut self) {
        let finished = self
            .reply_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        let task = self.reply_task.take().unwrap();
        let task_generation = self.reply_generation;
        let result = match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => return,
            Err(e) => Err(anyhow!("reply task failed: {e}")),
        };

        if task_generation != self.generation {
            tracing::debug!("discarding reply for a reset conversation");
            return;
        }

        self.loading = false;
        self.store.record_reply(&mut self.messages, result);
        self.scroll_to_bottom();
    }

    /// Discard the conversation and start over. Available at any time,
    /// including while a request is in flight - the request is aborted
    /// and its reply, should it still arrive, is discarded.
    pub fn reset_conversation(&mut self) {
        if let Some(task) = self.reply_task.take() {
            task.abort();
        }
        self.generation += 1;
        self.loading = false;
        self.messages = self.store.reset();
        self.chat_scroll = 0;
    }

    /// The most recent code block in the conversation, for clipboard copy
    pub fn last_code_block(&self) -> Option<String> {
        for msg in self.messages.iter().rev() {
            if msg.role != ChatRole::Assistant {
                continue;
            }
            let code = parse(&msg.content)
                .into_iter()
                .filter_map(|segment| match segment {
                    Segment::Code { content, .. } => Some(content),
                    Segment::Text { .. } => None,
                })
                .next_back();
            if code.is_some() {
                return code;
            }
        }
        None
    }

    // Chat scrolling. The render pass clamps chat_scroll to the real
    // line count, so jumping to the bottom just saturates.
    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(self.chat_height / 2);
    }

    pub fn scroll_half_page_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(self.chat_height / 2);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = u16::MAX;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
