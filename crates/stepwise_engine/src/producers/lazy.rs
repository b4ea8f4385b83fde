//! Deferred producer construction.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::subexpression::Subexpression;

type ProducerInit = Arc<dyn Fn() -> StepsProducer + Send + Sync>;

/// Builds its producer on first use and memoizes it. This is what lets plan
/// graphs refer to themselves (directly or mutually) without infinite
/// construction recursion. Concurrent first uses at worst build the producer
/// twice; the cell keeps exactly one, so callers always see the same graph.
pub struct LazySteps {
    init: ProducerInit,
    compiled: OnceCell<Arc<StepsProducer>>,
}

impl LazySteps {
    pub(crate) fn new(init: ProducerInit) -> Self {
        LazySteps {
            init,
            compiled: OnceCell::new(),
        }
    }

    fn producer(&self) -> &Arc<StepsProducer> {
        self.compiled.get_or_init(|| Arc::new((self.init)()))
    }

    pub fn min_depth(&self) -> usize {
        self.producer().min_depth()
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        self.producer().produce_steps(ctx, sub)
    }
}
