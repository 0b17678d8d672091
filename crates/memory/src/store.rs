//! Writing a finished turn back to short-term memory.

use memoria_core::error::RetrievalError;
use memoria_core::memory::{ConversationalMessage, MemoryService, MessageRole};

/// Append one user/assistant pair as a single turn.
pub async fn store_turn(
    service: &dyn MemoryService,
    actor_id: &str,
    session_id: &str,
    user_text: &str,
    assistant_text: &str,
) -> Result<(), RetrievalError> {
    let messages = vec![
        ConversationalMessage::new(user_text, MessageRole::User),
        ConversationalMessage::new(assistant_text, MessageRole::Assistant),
    ];
    service.add_turns(actor_id, session_id, messages).await
}
