//! Applying a producer to an extracted subexpression.

use std::sync::Arc;

use super::builder::StepsBuilder;
use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::pattern::Extractor;
use crate::subexpression::Subexpression;

/// Runs the inner producer on the subexpression an [`Extractor`] picks out of
/// the input. Inapplicable when extraction finds nothing. The inner steps
/// come back anchored onto the whole input.
pub struct ApplyTo {
    extractor: Arc<dyn Extractor>,
    inner: Arc<StepsProducer>,
}

impl ApplyTo {
    pub(crate) fn new(extractor: Arc<dyn Extractor>, inner: Arc<StepsProducer>) -> Self {
        ApplyTo { extractor, inner }
    }

    pub fn min_depth(&self) -> usize {
        self.inner.min_depth()
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let Some(target) = self.extractor.extract(sub) else {
            return Ok(None);
        };
        match self.inner.produce_steps(ctx, &target)? {
            None => Ok(None),
            Some(steps) => {
                let mut builder = StepsBuilder::new(ctx, sub.clone());
                builder.add_steps(steps);
                Ok(builder.final_steps())
            }
        }
    }
}
