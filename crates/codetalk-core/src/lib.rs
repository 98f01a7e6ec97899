pub mod ai;
pub mod config;
pub mod parser;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::GroqClient;
pub use config::Config;
pub use parser::{parse, style_for, BadgeStyle, Segment};
pub use state::{ChatMessage, ChatRole};
pub use store::{ConversationStore, FileStorage, Storage};
