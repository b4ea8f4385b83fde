//! Sequential composition of steps producers.
//!
//! A pipeline runs its items in order against the running expression. Failing
//! a required item aborts the whole pipeline; there is no partial output.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::builder::{tidy_up, StepsBuilder};
use super::{ProduceResult, StepsProducer};
use crate::context::Context;
use crate::pattern::Pattern;
use crate::subexpression::Subexpression;

pub type StagePredicate = Arc<dyn Fn(&Context, &Subexpression) -> bool + Send + Sync>;

pub enum PipelineItem {
    /// Required: the producer must apply or the pipeline aborts.
    Apply(Arc<StepsProducer>),
    /// Optional: inapplicability is skipped over.
    Optionally(Arc<StepsProducer>),
    /// If this applies, the pipeline ends successfully right here.
    Shortcut(Arc<StepsProducer>),
    /// Guard: abort unless the predicate holds on the running expression.
    Check(StagePredicate),
    /// Guard: abort unless the running expression matches the pattern.
    CheckForm(Arc<dyn Pattern>),
    /// Run the producer on every child of the running expression.
    ApplyToChildren {
        producer: Arc<StepsProducer>,
        /// Abort unless the producer applies to every child.
        all: bool,
        /// Abort unless the producer applies to at least one child.
        at_least_one: bool,
    },
}

pub struct Pipeline {
    items: Vec<PipelineItem>,
    min_depth_override: Option<usize>,
    min_depth: OnceCell<usize>,
}

impl Pipeline {
    /// Panics if `items` is empty; an empty pipeline is a construction
    /// mistake.
    pub(crate) fn new(items: Vec<PipelineItem>, min_depth_override: Option<usize>) -> Self {
        assert!(!items.is_empty(), "a pipeline needs at least one item");
        Pipeline {
            items,
            min_depth_override,
            min_depth: OnceCell::new(),
        }
    }

    /// The first required item bounds the depth of any input the pipeline
    /// can apply to. With only optional items, the loosest of their bounds
    /// applies. Guards before the first required item tighten the bound.
    fn compute_min_depth(&self) -> usize {
        if let Some(value) = self.min_depth_override {
            return value;
        }
        let mut bound = 0;
        let mut optional_bounds = Vec::new();
        for item in &self.items {
            match item {
                PipelineItem::Check(_) => {}
                PipelineItem::CheckForm(pattern) => {
                    bound = bound.max(pattern.min_depth());
                }
                PipelineItem::Apply(producer) => {
                    return bound.max(producer.min_depth());
                }
                PipelineItem::Optionally(producer) | PipelineItem::Shortcut(producer) => {
                    optional_bounds.push(producer.min_depth());
                }
                PipelineItem::ApplyToChildren {
                    producer,
                    at_least_one,
                    ..
                } => {
                    if *at_least_one {
                        return bound.max(producer.min_depth() + 1);
                    }
                    optional_bounds.push(producer.min_depth() + 1);
                }
            }
        }
        optional_bounds.into_iter().min().unwrap_or(bound)
    }

    pub fn min_depth(&self) -> usize {
        *self.min_depth.get_or_init(|| self.compute_min_depth())
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let mut builder = StepsBuilder::new(ctx, sub.clone());
        for item in &self.items {
            if !builder.in_progress() {
                break;
            }
            match item {
                PipelineItem::Apply(producer) => {
                    match producer.produce_steps(ctx, &builder.expression())? {
                        Some(steps) => {
                            builder.add_steps(steps);
                            tidy_up(&mut builder)?;
                        }
                        None => builder.abort(),
                    }
                }
                PipelineItem::Optionally(producer) => {
                    if let Some(steps) = producer.produce_steps(ctx, &builder.expression())? {
                        builder.add_steps(steps);
                        tidy_up(&mut builder)?;
                    }
                }
                PipelineItem::Shortcut(producer) => {
                    if let Some(steps) = producer.produce_steps(ctx, &builder.expression())? {
                        builder.add_steps(steps);
                        builder.succeed();
                    }
                }
                PipelineItem::Check(predicate) => {
                    if !predicate(ctx, &builder.expression()) {
                        builder.abort();
                    }
                }
                PipelineItem::CheckForm(pattern) => {
                    if !pattern.matches(ctx, &builder.expression()) {
                        builder.abort();
                    }
                }
                PipelineItem::ApplyToChildren {
                    producer,
                    all,
                    at_least_one,
                } => {
                    let child_count = builder.expression().expr.child_count();
                    let mut applied_to_some = false;
                    for index in 0..child_count {
                        let Some(child) = builder.expression().child(index) else {
                            continue;
                        };
                        match producer.produce_steps(ctx, &child)? {
                            Some(steps) => {
                                applied_to_some = true;
                                builder.add_steps(steps);
                            }
                            None => {
                                if *all {
                                    builder.abort();
                                    break;
                                }
                            }
                        }
                    }
                    if builder.in_progress() {
                        tidy_up(&mut builder)?;
                        if *at_least_one && !applied_to_some {
                            builder.abort();
                        }
                    }
                }
            }
            if builder.undefined() {
                break;
            }
        }
        Ok(builder.final_steps())
    }
}

/// A pure applicability guard usable where a steps producer is expected.
///
/// The one producer allowed to succeed with an empty step list: matching
/// yields `Ok(Some(vec![]))`, so a surrounding pipeline carries on without
/// recording a step, while a mismatch is ordinary inapplicability.
pub struct FormChecker {
    pub pattern: Arc<dyn Pattern>,
}

impl FormChecker {
    pub fn new(pattern: Arc<dyn Pattern>) -> Self {
        FormChecker { pattern }
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        if self.pattern.matches(ctx, sub) {
            Ok(Some(Vec::new()))
        } else {
            Ok(None)
        }
    }

    pub fn min_depth(&self) -> usize {
        self.pattern.min_depth()
    }
}
