//! Prompt composition
//!
//! Pure string builders for the three prompt shapes the collaboration loop
//! needs. None of these touch the invoker or mutate state; they are
//! deterministic given their inputs.

use crate::store::Turn;

/// Appended after every main-agent answer.
pub const HELPFUL_PROMPT: &str = "Was this response helpful? (yes/no)";

/// Appended after a rejection to ask for a description.
pub const DESCRIBE_PROMPT: &str =
    "Please describe what went wrong or what you expected. You can leave this empty to skip.";

/// Corrective turn for input that is neither yes nor no.
pub const YES_NO_PROMPT: &str = "Please respond with 'yes' or 'no'.";

/// Main-agent acknowledgement after acceptance.
pub const ACK: &str = "Awesome! Glad we got it right.";

/// Programmer turn recorded when the description is skipped.
pub const NO_FEEDBACK_TURN: &str = "No specific feedback provided.";

/// Fixed summarization prompt sent to the helpers when the improved prompt
/// is over budget. Carries no reference to the request or prior responses.
pub const SUMMARY_PROMPT: &str =
    "Your previous response was too long. Please provide a concise summary in 2-3 sentences.";

/// Render history as `{role}: {content}` lines, oldest first.
pub fn render_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn feedback_sentence(feedback: &str) -> String {
    if feedback.is_empty() {
        "The programmer didn't provide specific feedback.".to_string()
    } else {
        format!("The programmer said: {feedback}")
    }
}

/// Prompt for the main agent's first attempt at a request.
pub fn build_initial_prompt(request: &str, history: &[Turn]) -> String {
    let history_text = render_history(history);
    format!(
        "Here is the conversation history so far:\n\
         \n\
         {history_text}\n\
         \n\
         The programmer has made the following request:\n\
         \n\
         {request}\n\
         \n\
         Your task is to understand the programmer's goal and provide a helpful response. This could involve:\n\
         - Generating complete, working code if they ask for it, along with a clear explanation.\n\
         - Explaining a concept or code clearly and concisely if they seek understanding.\n\
         - Identifying and fixing issues if they provide code with errors or ask for improvements.\n\
         Please interpret their request and respond with a solution that meets their goal.\n"
    )
}

/// Prompt asking one helper for a better solution after a rejection.
pub fn build_helper_prompt(
    request: &str,
    main_response: &str,
    history: &[Turn],
    feedback: &str,
) -> String {
    let history_text = render_history(history);
    let feedback_text = feedback_sentence(feedback);
    format!(
        "We're in a group discussion to help a programmer. Here's the conversation so far:\n\
         \n\
         {history_text}\n\
         \n\
         The programmer asked:\n\
         \n\
         {request}\n\
         \n\
         I responded with:\n\
         \n\
         {main_response}\n\
         \n\
         But it wasn't helpful. {feedback_text}\n\
         Can you suggest a better solution? Please:\n\
         - Provide complete code if applicable.\n\
         - Include a clear explanation.\n\
         - Focus on accurately addressing the programmer's goal.\n"
    )
}

/// Prompt for the main agent's revised attempt. `helper1`/`helper2` may be
/// the full helper responses or their shortened summaries.
pub fn build_improved_prompt(
    request: &str,
    history: &[Turn],
    main_response: &str,
    helper1: &str,
    helper2: &str,
    feedback: &str,
) -> String {
    let history_text = render_history(history);
    let feedback_text = feedback_sentence(feedback);
    format!(
        "We're working together to solve the programmer's request. Here's the conversation history:\n\
         \n\
         {history_text}\n\
         \n\
         The programmer asked:\n\
         \n\
         {request}\n\
         \n\
         My latest response was:\n\
         \n\
         {main_response}\n\
         \n\
         But it wasn't helpful. {feedback_text}\n\
         Here's what the team suggested:\n\
         \n\
         Helper 1 said:\n\
         \n\
         {helper1}\n\
         \n\
         Helper 2 said:\n\
         \n\
         {helper2}\n\
         \n\
         Now, it's my turn again. Using the helpers' suggestions and the history:\n\
         - Provide an improved response that accurately meets the programmer's goal.\n\
         - Include complete code if applicable, with a clear explanation.\n\
         - Correct any mistakes from my previous attempt.\n"
    )
}
