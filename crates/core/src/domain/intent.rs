use serde::{Deserialize, Serialize};

/// Classification label attached to a user utterance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Unclassified,
    Blocked,
    Rewrite,
    Summarize,
    Chat,
}

/// Labels sniffed from classifier output, checked in this order.
const CLASSIFIER_LABELS: [(&str, Intent); 3] =
    [("blocked", Intent::Blocked), ("rewrite", Intent::Rewrite), ("summarize", Intent::Summarize)];

impl Intent {
    /// Maps free-text classifier output onto a label.
    ///
    /// The text is lower-cased and trimmed, then searched for `blocked`,
    /// `rewrite` and `summarize` in that order. First match wins, so output
    /// mentioning several labels resolves to the earliest one in that list.
    /// Anything else is `Chat`.
    pub fn from_classifier_output(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        CLASSIFIER_LABELS
            .iter()
            .find(|(needle, _)| normalized.contains(needle))
            .map(|(_, intent)| *intent)
            .unwrap_or(Intent::Chat)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Blocked => "blocked",
            Self::Rewrite => "rewrite",
            Self::Summarize => "summarize",
            Self::Chat => "chat",
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}
