//! Steps producers: the combinator algebra composite methods are built from.
//!
//! A producer maps a subexpression to an explained chain of steps, `Ok(None)`
//! when it does not apply. The set of combinators is closed; composite
//! methods are data, assembled with the fluent constructors at the bottom of
//! this module and walked by `produce_steps`.

pub mod apply_to;
pub mod branch_on;
pub mod builder;
pub mod deeply;
pub mod first_of;
pub mod in_step;
pub mod labels;
pub mod lazy;
pub mod pipeline;
pub mod selector;
pub mod while_possible;

use std::sync::Arc;

use crate::context::Context;
use crate::error::EngineError;
use crate::method::Method;
use crate::pattern::{Extractor, Pattern};
use crate::step::Transformation;
use crate::subexpression::Subexpression;

pub use apply_to::ApplyTo;
pub use branch_on::{BranchOn, BranchOnBuilder};
pub use builder::StepsBuilder;
pub use deeply::Deeply;
pub use first_of::{FirstOf, FirstOfOption};
pub use in_step::{InStep, InStepItem};
pub use labels::WithNewLabels;
pub use lazy::LazySteps;
pub use pipeline::{FormChecker, Pipeline, PipelineItem, StagePredicate};
pub use selector::{ContextSensitiveSelector, SelectableProducer};
pub use while_possible::WhilePossible;

/// Cap on rounds of any repetition construct. Exceeding it means two rules
/// are undoing each other.
pub const MAX_ITERATIONS: usize = 100;

/// `Ok(Some(steps))` on success, `Ok(None)` when inapplicable.
pub type ProduceResult = Result<Option<Vec<Transformation>>, EngineError>;

/// A composed recipe for producing steps. Closed by design: adding a
/// combinator is an engine change, not a method-author extension point.
pub enum StepsProducer {
    Pipeline(Pipeline),
    FirstOf(FirstOf),
    WhilePossible(WhilePossible),
    Deeply(Deeply),
    BranchOn(BranchOn),
    ApplyTo(ApplyTo),
    InStep(InStep),
    WithNewLabels(WithNewLabels),
    FormChecker(FormChecker),
    ContextSensitiveSelector(ContextSensitiveSelector),
    Lazy(LazySteps),
    /// A whole method used as a producer; its transformation becomes a
    /// single step.
    Method(Arc<Method>),
}

impl StepsProducer {
    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        match self {
            StepsProducer::Pipeline(p) => p.produce_steps(ctx, sub),
            StepsProducer::FirstOf(p) => p.produce_steps(ctx, sub),
            StepsProducer::WhilePossible(p) => p.produce_steps(ctx, sub),
            StepsProducer::Deeply(p) => p.produce_steps(ctx, sub),
            StepsProducer::BranchOn(p) => p.produce_steps(ctx, sub),
            StepsProducer::ApplyTo(p) => p.produce_steps(ctx, sub),
            StepsProducer::InStep(p) => p.produce_steps(ctx, sub),
            StepsProducer::WithNewLabels(p) => p.produce_steps(ctx, sub),
            StepsProducer::FormChecker(p) => p.produce_steps(ctx, sub),
            StepsProducer::ContextSensitiveSelector(p) => p.produce_steps(ctx, sub),
            StepsProducer::Lazy(p) => p.produce_steps(ctx, sub),
            StepsProducer::Method(method) => {
                Ok(method.try_execute(ctx, sub)?.map(|step| vec![step]))
            }
        }
    }

    /// Lower bound on the depth of an input this producer can apply to.
    pub fn min_depth(&self) -> usize {
        match self {
            StepsProducer::Pipeline(p) => p.min_depth(),
            StepsProducer::FirstOf(p) => p.min_depth(),
            StepsProducer::WhilePossible(p) => p.min_depth(),
            StepsProducer::Deeply(p) => p.min_depth(),
            StepsProducer::BranchOn(p) => p.min_depth(),
            StepsProducer::ApplyTo(p) => p.min_depth(),
            StepsProducer::InStep(p) => p.min_depth(),
            StepsProducer::WithNewLabels(p) => p.min_depth(),
            StepsProducer::FormChecker(p) => p.min_depth(),
            StepsProducer::ContextSensitiveSelector(p) => p.min_depth(),
            StepsProducer::Lazy(p) => p.min_depth(),
            StepsProducer::Method(method) => method.min_depth(),
        }
    }
}

/// Start a pipeline.
pub fn steps() -> PipelineBuilder {
    PipelineBuilder::new()
}

pub struct PipelineBuilder {
    items: Vec<PipelineItem>,
    min_depth_override: Option<usize>,
}

impl PipelineBuilder {
    fn new() -> Self {
        PipelineBuilder {
            items: Vec::new(),
            min_depth_override: None,
        }
    }

    pub fn apply(mut self, producer: StepsProducer) -> Self {
        self.items.push(PipelineItem::Apply(Arc::new(producer)));
        self
    }

    pub fn apply_method(self, method: Method) -> Self {
        self.apply(method.into_steps())
    }

    pub fn optionally(mut self, producer: StepsProducer) -> Self {
        self.items
            .push(PipelineItem::Optionally(Arc::new(producer)));
        self
    }

    pub fn shortcut(mut self, producer: StepsProducer) -> Self {
        self.items.push(PipelineItem::Shortcut(Arc::new(producer)));
        self
    }

    pub fn check<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Context, &Subexpression) -> bool + Send + Sync + 'static,
    {
        self.items.push(PipelineItem::Check(Arc::new(predicate)));
        self
    }

    pub fn check_form(mut self, pattern: Arc<dyn Pattern>) -> Self {
        self.items.push(PipelineItem::CheckForm(pattern));
        self
    }

    pub fn apply_to_children(mut self, producer: StepsProducer) -> Self {
        self.items.push(PipelineItem::ApplyToChildren {
            producer: Arc::new(producer),
            all: false,
            at_least_one: false,
        });
        self
    }

    pub fn apply_to_all_children(mut self, producer: StepsProducer) -> Self {
        self.items.push(PipelineItem::ApplyToChildren {
            producer: Arc::new(producer),
            all: true,
            at_least_one: true,
        });
        self
    }

    pub fn apply_to_some_children(mut self, producer: StepsProducer) -> Self {
        self.items.push(PipelineItem::ApplyToChildren {
            producer: Arc::new(producer),
            all: false,
            at_least_one: true,
        });
        self
    }

    pub fn with_min_depth(mut self, min_depth: usize) -> Self {
        self.min_depth_override = Some(min_depth);
        self
    }

    pub fn build(self) -> StepsProducer {
        StepsProducer::Pipeline(Pipeline::new(self.items, self.min_depth_override))
    }
}

/// Start an ordered-alternatives producer.
pub fn first_of() -> FirstOfBuilder {
    FirstOfBuilder { options: Vec::new() }
}

pub struct FirstOfBuilder {
    options: Vec<FirstOfOption>,
}

impl FirstOfBuilder {
    pub fn option(mut self, producer: StepsProducer) -> Self {
        self.options
            .push(FirstOfOption::Option(Arc::new(producer)));
        self
    }

    pub fn option_method(self, method: Method) -> Self {
        self.option(method.into_steps())
    }

    pub fn short_option(mut self, producer: StepsProducer) -> Self {
        self.options
            .push(FirstOfOption::ShortOption(Arc::new(producer)));
        self
    }

    pub fn build(self) -> StepsProducer {
        StepsProducer::FirstOf(FirstOf::new(self.options))
    }
}

pub fn while_possible(producer: StepsProducer) -> StepsProducer {
    StepsProducer::WhilePossible(WhilePossible::new(Arc::new(producer)))
}

/// Prefix-order deep application.
pub fn deeply(producer: StepsProducer) -> StepsProducer {
    StepsProducer::Deeply(Deeply::new(Arc::new(producer), false))
}

/// Postfix-order deep application (children before their parent).
pub fn deeply_deep_first(producer: StepsProducer) -> StepsProducer {
    StepsProducer::Deeply(Deeply::new(Arc::new(producer), true))
}

pub fn branch_on(setting: crate::context::Setting) -> BranchOnBuilder {
    BranchOnBuilder::new(setting)
}

pub fn apply_to(extractor: Arc<dyn Extractor>, producer: StepsProducer) -> StepsProducer {
    StepsProducer::ApplyTo(ApplyTo::new(extractor, Arc::new(producer)))
}

pub fn in_step(items: Vec<InStepItem>) -> StepsProducer {
    StepsProducer::InStep(InStep::new(items))
}

pub fn with_new_labels(producer: StepsProducer) -> StepsProducer {
    StepsProducer::WithNewLabels(WithNewLabels::new(Arc::new(producer)))
}

pub fn check_form(pattern: Arc<dyn Pattern>) -> StepsProducer {
    StepsProducer::FormChecker(FormChecker::new(pattern))
}

pub fn select_steps(
    default: SelectableProducer,
    alternatives: Vec<SelectableProducer>,
) -> StepsProducer {
    StepsProducer::ContextSensitiveSelector(ContextSensitiveSelector::new(default, alternatives))
}

/// Defer construction of a producer, enabling recursive plan graphs.
pub fn lazy_steps<F>(init: F) -> StepsProducer
where
    F: Fn() -> StepsProducer + Send + Sync + 'static,
{
    StepsProducer::Lazy(LazySteps::new(Arc::new(init)))
}
