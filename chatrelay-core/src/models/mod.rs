mod chat_row;
mod reply;

pub use chat_row::{render_transcript, ChatRow, ConversationLine, Role};
pub use reply::AssistantReply;
