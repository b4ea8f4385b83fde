//! Context-sensitive choice between producers.

use std::sync::Arc;

use super::{ProduceResult, StepsProducer};
use crate::context::{Context, Resource, ResourceData};
use crate::subexpression::Subexpression;

/// A selectable producer with the descriptor the embedder keys selection on.
pub struct SelectableProducer {
    pub producer: Arc<StepsProducer>,
    pub resource_data: ResourceData,
}

impl Resource for SelectableProducer {
    fn resource_data(&self) -> &ResourceData {
        &self.resource_data
    }
}

/// Delegates to whichever alternative the context's resource selector picks,
/// falling back to the default when no selector is installed or it abstains.
pub struct ContextSensitiveSelector {
    pub default: SelectableProducer,
    pub alternatives: Vec<SelectableProducer>,
}

impl ContextSensitiveSelector {
    pub(crate) fn new(
        default: SelectableProducer,
        alternatives: Vec<SelectableProducer>,
    ) -> Self {
        ContextSensitiveSelector {
            default,
            alternatives,
        }
    }

    pub fn min_depth(&self) -> usize {
        self.alternatives
            .iter()
            .map(|a| a.producer.min_depth())
            .chain([self.default.producer.min_depth()])
            .min()
            .unwrap_or(1)
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let selected = ctx.select_best_resource(&self.default, &self.alternatives);
        selected.producer.produce_steps(ctx, sub)
    }
}
