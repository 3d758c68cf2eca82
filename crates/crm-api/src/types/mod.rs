//! Wire types shared by the REST client and the realtime channel.

mod conversation;
mod id;
mod identity;
mod message;

pub use conversation::{ConversationList, ConversationSummary, LastMessage};
pub use identity::{Counterpart, Identity, Role};
pub use message::{Message, MessageHistory, SendMessageParams, SentMessage, TypingParams};
