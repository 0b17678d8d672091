//! System prompt construction.

const DEFAULT_PREAMBLE: &str = "You are Memoria, a helpful AI assistant that remembers the people it works with. \
Use what you know about the user from the memory sections below when it is relevant, \
and do not mention the memory sections unless asked.";

/// Build the system prompt: preamble, memory context, then operating rules.
///
/// `session_id` is the session reported to remote tools that keep their own
/// sessions (e.g. a code interpreter); it may be empty.
pub fn build_system_prompt(
    preamble_override: Option<&str>,
    memory_context: &str,
    session_id: &str,
    has_tools: bool,
) -> String {
    let preamble = preamble_override.unwrap_or(DEFAULT_PREAMBLE);
    let mut prompt = format!("{preamble}\n{memory_context}");

    prompt.push_str("\nRULES:\n");
    prompt.push_str("1. Answer directly when no tool is needed.\n");
    if has_tools {
        prompt.push_str("2. Use the available tools without asking for permission.\n");
        prompt.push_str(
            "3. If no listed tool fits the task, look for a tool search capability before saying you cannot do something.\n",
        );
        prompt.push_str(&format!(
            "4. Pass the session id \"{session_id}\" to tools that accept one, even if it is empty.\n"
        ));
    }
    prompt.push_str("\nYour response should show the results and give a brief explanation.\n");
    prompt
}
