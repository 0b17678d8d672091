//! Context blocks produced by the recall stages.

/// Which recall stage produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    ShortTerm,
    LongTerm,
    Episodic,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "stm",
            Self::LongTerm => "ltm",
            Self::Episodic => "episodic",
        }
    }
}

/// A rendered fragment of the system prompt. Empty text means the stage had
/// nothing to contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub kind: BlockKind,
    pub text: String,
}

impl ContextBlock {
    pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn empty(kind: BlockKind) -> Self {
        Self::new(kind, String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
