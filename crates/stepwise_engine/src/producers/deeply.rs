//! Whole-tree search applying a producer once at the first matching node.

use std::sync::Arc;

use super::builder::StepsBuilder;
use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::subexpression::Subexpression;

/// Searches the tree for one node the inner producer applies to.
///
/// Prefix order tries a node before its children; postfix (`deep_first`)
/// tries the children first. The producer is applied exactly once per call,
/// at the first node where it succeeds. Subtrees shallower than the inner
/// producer's `min_depth` are skipped without being visited, and subtrees
/// that already failed in this request are skipped via the context's failure
/// cache.
pub struct Deeply {
    inner: Arc<StepsProducer>,
    deep_first: bool,
}

impl Deeply {
    pub(crate) fn new(inner: Arc<StepsProducer>, deep_first: bool) -> Self {
        Deeply { inner, deep_first }
    }

    pub fn min_depth(&self) -> usize {
        self.inner.min_depth()
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        match self.visit(ctx, sub)? {
            None => Ok(None),
            Some(steps) => {
                // Anchor the deep steps onto the input we were given.
                let mut builder = StepsBuilder::new(ctx, sub.clone());
                builder.add_steps(steps);
                Ok(builder.final_steps())
            }
        }
    }

    fn visit(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        if sub.expr.depth() < self.inner.min_depth() {
            return Ok(None);
        }
        ctx.unless_previously_failed(self as *const Deeply as usize, &sub.expr, || {
            if !self.deep_first {
                if let Some(steps) = self.inner.produce_steps(ctx, sub)? {
                    return Ok(Some(steps));
                }
            }
            for child in sub.children() {
                if let Some(steps) = self.visit(ctx, &child)? {
                    return Ok(Some(steps));
                }
            }
            if self.deep_first {
                self.inner.produce_steps(ctx, sub)
            } else {
                Ok(None)
            }
        })
    }
}
