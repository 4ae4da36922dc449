use serde::{Deserialize, Serialize};

/// Card inserted in a reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub atr: String,
    #[serde(default)]
    pub description: Vec<String>,
}

/// Card reader as reported by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardReader {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Whether the reader has a hardware pinpad
    #[serde(default)]
    pub pinpad: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
}

impl CardReader {
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }
}

/// Filter for the reader list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderFilter {
    /// Every connected reader
    #[default]
    All,
    /// Only readers with a card inserted
    WithCard,
    /// Only readers without a card
    WithoutCard,
}

impl ReaderFilter {
    /// Value of the `card-inserted` query parameter
    pub(crate) const fn card_inserted(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::WithCard => Some("true"),
            Self::WithoutCard => Some("false"),
        }
    }
}
