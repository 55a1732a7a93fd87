use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for Ilirion.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains. Note that the completion
/// orchestrator never surfaces any of these to its caller: every failure
/// path there resolves to a canned string.
#[derive(Debug, Error)]
pub enum IlirionError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Upstream provider ───────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Knowledge collaborator ──────────────────────────────────────────
    #[error("knowledge: {0}")]
    Knowledge(#[from] KnowledgeError),

    // ── Research collaborator ───────────────────────────────────────────
    #[error("research: {0}")]
    Research(#[from] ResearchError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Upstream provider errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key configured. Checked before any network call is attempted.
    #[error("API key not configured")]
    MissingCredentials,

    /// 401/403 from upstream.
    #[error("authentication rejected by upstream (status {status})")]
    Auth { status: u16 },

    /// Any other non-2xx status.
    #[error("upstream API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response without usable content.
    #[error("upstream returned empty content")]
    EmptyContent,

    /// Network-level failure (connect, timeout, decode).
    #[error("request failed: {0}")]
    Request(String),
}

// ─── Knowledge collaborator errors ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("retrieval failed: {0}")]
    Retrieve(String),

    #[error("learn notification failed: {0}")]
    Learn(String),
}

// ─── Research collaborator errors ───────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("search failed: {0}")]
    Search(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, IlirionError>;
