//! Quote error taxonomy
//!
//! Per-candidate failures (one fee tier, one path) never reach callers;
//! they are swallowed as "try next candidate". Only the variants here cross
//! the engine boundary.

/// Errors surfaced by the quote engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// Malformed request: same-asset swap, bad amount, path length mismatch.
    /// Detected synchronously, before any remote call.
    InvalidInput(String),

    /// A protocol/fee-tier combination has no pool or quotes zero output.
    /// Non-fatal within a request; the candidate is skipped.
    NoLiquidity,

    /// The chain-query collaborator errored or timed out for one protocol
    Remote(String),

    /// The request was superseded by a newer one; the result was discarded
    Cancelled,

    /// Every protocol either had no liquidity or failed remotely
    NoRoute,
}

impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteError::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            QuoteError::NoLiquidity => write!(f, "no liquidity for this pair"),
            QuoteError::Remote(reason) => write!(f, "chain query failed: {}", reason),
            QuoteError::Cancelled => write!(f, "request superseded"),
            QuoteError::NoRoute => write!(f, "no route available"),
        }
    }
}

impl std::error::Error for QuoteError {}
