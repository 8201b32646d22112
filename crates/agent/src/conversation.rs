use crate::prompts::{HISTORY_LABEL, NEW_QUESTION_LABEL};

/// Folds prior turns and the current utterance into one generation prompt.
///
/// Without history the utterance is returned unchanged. Otherwise the turns
/// are newline-joined, oldest first, under the previous-conversation label,
/// followed by the utterance under the new-question label.
pub fn assemble(current: &str, history: &[String]) -> String {
    if history.is_empty() {
        return current.to_string();
    }

    format!("{HISTORY_LABEL}\n{}\n\n{NEW_QUESTION_LABEL} {current}", history.join("\n"))
}
