//! Engine failure conditions.
//!
//! Inapplicability is not an error: methods and steps producers signal it with
//! `Ok(None)`. The variants here are genuine runtime failures that abort the
//! whole computation and propagate with `?` to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A repetition construct kept finding applicable steps past its
    /// iteration cap, which practically always means a pair of rules undoing
    /// each other.
    #[error("maximum number of iterations ({limit}) exceeded while rewriting {expression}")]
    TooManyIterations { limit: usize, expression: String },

    /// The embedder's cancellation check reported that this computation
    /// should stop (deadline passed, client went away).
    #[error("computation interrupted by the embedder")]
    Interrupted,
}
