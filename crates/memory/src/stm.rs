//! Short-term memory: recent conversation turns of the current session.

use crate::block::{BlockKind, ContextBlock};
use memoria_core::error::RetrievalError;
use memoria_core::memory::{MemoryService, Turn};

const HEADER: &str = "\n## CONVERSATION HISTORY:\n";

/// Fetch the last `k` turns of `(actor_id, session_id)` and render them.
pub async fn fetch_stm(
    service: &dyn MemoryService,
    actor_id: &str,
    session_id: &str,
    k: usize,
) -> Result<ContextBlock, RetrievalError> {
    let turns = service.get_last_k_turns(actor_id, session_id, k).await?;
    Ok(ContextBlock::new(BlockKind::ShortTerm, format_turns(&turns)))
}

/// Render turns as `User: ...` / `Assistant: ...` lines under the history
/// header. Messages with empty text are skipped; no lines means `""`.
pub fn format_turns(turns: &[Turn]) -> String {
    let lines: Vec<String> = turns
        .iter()
        .flatten()
        .filter(|msg| !msg.content.text.is_empty())
        .map(|msg| format!("{}: {}", speaker_label(&msg.role), msg.content.text))
        .collect();

    if lines.is_empty() {
        return String::new();
    }
    format!("{HEADER}{}\n", lines.join("\n"))
}

fn speaker_label(role: &str) -> &'static str {
    let role = role.to_lowercase();
    if role == "user" || role == "human" {
        "User"
    } else {
        "Assistant"
    }
}
