//! Lock-step application of methods across all children.
//!
//! Used for "do the same thing to both sides" presentations: each mini-step
//! applies one method to every child of the input and is published as a
//! single composite step whose inner steps are the per-child rewrites.

use std::sync::Arc;

use stepwise_ast::path::relative_to;

use super::builder::StepsBuilder;
use super::ProduceResult;
use crate::context::Context;
use crate::metadata::{Metadata, MetadataKey};
use crate::method::Method;
use crate::step::Transformation;
use crate::subexpression::Subexpression;

pub struct InStepItem {
    pub method: Arc<Method>,
    pub explanation: MetadataKey,
    /// Optional items apply where they can; required items must apply to
    /// every child or the whole producer is inapplicable.
    pub optional: bool,
}

pub struct InStep {
    items: Vec<InStepItem>,
}

impl InStep {
    /// Panics if `items` is empty.
    pub(crate) fn new(items: Vec<InStepItem>) -> Self {
        assert!(!items.is_empty(), "inStep needs at least one item");
        InStep { items }
    }

    pub fn min_depth(&self) -> usize {
        let required = self
            .items
            .iter()
            .filter(|item| !item.optional)
            .map(|item| item.method.min_depth())
            .max();
        match required {
            Some(depth) => depth + 1,
            None => {
                self.items
                    .iter()
                    .map(|item| item.method.min_depth())
                    .min()
                    .unwrap_or(1)
                    + 1
            }
        }
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let mut builder = StepsBuilder::new(ctx, sub.clone());
        let mut child_states: Vec<Subexpression> = sub.children();

        for item in &self.items {
            let mut outcomes: Vec<Option<Transformation>> =
                Vec::with_capacity(child_states.len());
            for child in &child_states {
                outcomes.push(item.method.try_execute(ctx, child)?);
            }
            if !item.optional && outcomes.iter().any(Option::is_none) {
                return Ok(None);
            }
            let applied: Vec<Transformation> =
                outcomes.iter().flatten().cloned().collect();
            if applied.is_empty() {
                continue;
            }

            let before = builder.expression();
            let mut combined = before.expr.clone();
            for step in &applied {
                if let Some(relative) = relative_to(&step.from_expr.path, &before.path) {
                    combined = combined.substitute(relative, &step.to_expr);
                }
            }
            builder.add_step(Transformation::plan(
                before,
                combined,
                applied,
                Some(Metadata::new(item.explanation)),
                Vec::new(),
            ));

            for (child, outcome) in child_states.iter_mut().zip(&outcomes) {
                if let Some(step) = outcome {
                    *child = child.with_expr(step.to_expr.clone());
                }
            }
        }
        Ok(builder.final_steps())
    }
}
