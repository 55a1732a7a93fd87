use crate::config::MemoryConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Caller-selected capacity class. Derived per request and never stored on
/// the session, so a later standard-tier call can shrink a window that an
/// elevated-tier call grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    #[default]
    Standard,
    Elevated,
}

impl Tier {
    /// Message-count ceiling for the retained (and sent) history window.
    pub fn window(self, memory: &MemoryConfig) -> usize {
        match self {
            Tier::Standard => memory.standard_window,
            Tier::Elevated => memory.elevated_window,
        }
    }

    /// Output-token ceiling for the upstream call.
    pub fn max_tokens(self, memory: &MemoryConfig) -> u32 {
        match self {
            Tier::Standard => memory.standard_max_tokens,
            Tier::Elevated => memory.elevated_max_tokens,
        }
    }
}
