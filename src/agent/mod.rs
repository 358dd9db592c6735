pub mod conversation;
pub mod prompt;
pub mod session;
pub mod tool_loop;

pub use conversation::{Conversation, ExchangeDraft, check_tool_links};
pub use prompt::build_system_prompt;
pub use session::{AgentSession, SessionControl, SessionHandle};
pub use tool_loop::{
    AgentLoop, ExchangeParams, ExchangeReport, LoopSettings, LoopState, TurnOutcome,
};
