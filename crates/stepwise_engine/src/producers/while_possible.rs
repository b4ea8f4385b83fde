//! Repetition until a producer stops applying.

use std::sync::Arc;

use super::builder::{tidy_up, StepsBuilder};
use super::{ProduceResult, StepsProducer, MAX_ITERATIONS};
use crate::context::Context;
use crate::error::EngineError;
use crate::subexpression::Subexpression;

/// Applies the inner producer repeatedly, chaining each round's output into
/// the next round's input. Inapplicable on the first round means inapplicable
/// overall. The iteration cap exists to catch rule pairs that undo each
/// other; hitting it is an error, not a result.
pub struct WhilePossible {
    inner: Arc<StepsProducer>,
}

impl WhilePossible {
    pub(crate) fn new(inner: Arc<StepsProducer>) -> Self {
        WhilePossible { inner }
    }

    pub fn min_depth(&self) -> usize {
        self.inner.min_depth()
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let mut builder = StepsBuilder::new(ctx, sub.clone());
        for _ in 0..MAX_ITERATIONS {
            match self.inner.produce_steps(ctx, &builder.expression())? {
                None => return Ok(builder.final_steps()),
                Some(steps) => {
                    builder.add_steps(steps);
                    tidy_up(&mut builder)?;
                    if builder.undefined() {
                        return Ok(builder.final_steps());
                    }
                }
            }
        }
        Err(EngineError::TooManyIterations {
            limit: MAX_ITERATIONS,
            expression: builder.expression().expr.to_string(),
        })
    }
}
