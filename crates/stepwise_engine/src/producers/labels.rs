//! Scratch label scoping.

use std::sync::Arc;

use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::step::Transformation;
use crate::subexpression::Subexpression;

/// Gives the inner producer a clean label namespace: labels already on the
/// input are cleared before it runs, and any labels its steps introduce are
/// stripped from the published output. Labels never leak out of the producer
/// that set them.
pub struct WithNewLabels {
    inner: Arc<StepsProducer>,
}

impl WithNewLabels {
    pub(crate) fn new(inner: Arc<StepsProducer>) -> Self {
        WithNewLabels { inner }
    }

    pub fn min_depth(&self) -> usize {
        self.inner.min_depth()
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let cleared = sub.with_expr(sub.expr.clear_labels());
        match self.inner.produce_steps(ctx, &cleared)? {
            None => Ok(None),
            Some(steps) => Ok(Some(
                steps.iter().map(Transformation::clear_labels).collect(),
            )),
        }
    }
}
