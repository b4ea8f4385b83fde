//! Accumulates the steps of a composite computation.
//!
//! Producers working on a subexpression hand their steps to a builder, which
//! re-anchors each one onto the original input by substituting its result at
//! the step's path. Aborting discards everything; there is no partial output.

use stepwise_ast::{path::relative_to, Expr};

use crate::context::Context;
use crate::error::EngineError;
use crate::step::Transformation;
use crate::subexpression::Subexpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    InProgress,
    Succeeded,
    Aborted,
}

/// Step accumulator for one pipeline-like computation.
#[derive(Clone)]
pub struct StepsBuilder<'c> {
    ctx: &'c Context,
    input: Subexpression,
    current: Expr,
    steps: Vec<Transformation>,
    status: Status,
}

impl<'c> StepsBuilder<'c> {
    pub fn new(ctx: &'c Context, input: Subexpression) -> Self {
        let current = input.expr.clone();
        StepsBuilder {
            ctx,
            input,
            current,
            steps: Vec::new(),
            status: Status::InProgress,
        }
    }

    pub fn ctx(&self) -> &'c Context {
        self.ctx
    }

    /// The current state of the input, anchored at the input's position.
    pub fn expression(&self) -> Subexpression {
        self.input.with_expr(self.current.clone())
    }

    pub fn in_progress(&self) -> bool {
        self.status == Status::InProgress
    }

    pub fn undefined(&self) -> bool {
        self.current.is_undefined()
    }

    /// Append one step, re-anchoring it onto the input.
    ///
    /// If the chain loops back to an expression an earlier step started from,
    /// the looping steps are dropped.
    pub fn add_step(&mut self, step: Transformation) {
        if !self.in_progress() {
            return;
        }
        let substitution = if step.to_expr.is_undefined() {
            step.to_expr.clone()
        } else {
            match relative_to(&step.from_expr.path, &self.input.path) {
                Some(relative) => self.current.substitute(relative, &step.to_expr),
                // A step anchored outside our scope can only be taken as a
                // whole-expression rewrite.
                None => step.to_expr.clone(),
            }
        };
        let anchored = if step.from_expr.path == self.input.path
            && substitution == step.to_expr
            && !step.to_expr.is_undefined()
        {
            step
        } else {
            step.re_anchored(self.expression(), substitution.clone())
        };
        self.steps.push(anchored);
        if let Some(index) = self
            .steps
            .iter()
            .position(|s| s.from_expr.expr == substitution)
        {
            tracing::warn!(
                expression = %substitution,
                dropped = self.steps.len() - index,
                "circular steps detected, truncating"
            );
            self.steps.truncate(index);
        }
        self.current = substitution;
    }

    pub fn add_steps(&mut self, steps: Vec<Transformation>) {
        if !self.in_progress() {
            return;
        }
        for step in steps {
            self.add_step(step);
        }
    }

    /// Discard everything; `final_steps` will return `None`.
    pub fn abort(&mut self) {
        self.status = Status::Aborted;
    }

    /// Freeze the builder; later `add_step` calls are ignored.
    pub fn succeed(&mut self) {
        if self.in_progress() {
            self.status = Status::Succeeded;
        }
    }

    /// Remove scratch labels from the current expression and all steps.
    pub fn clear_labels(&mut self) {
        self.current = self.current.clear_labels();
        for step in &mut self.steps {
            *step = step.clear_labels();
        }
    }

    /// Copy of this builder for speculative work that may be thrown away.
    pub fn branch(&self) -> StepsBuilder<'c> {
        self.clone()
    }

    pub fn steps(&self) -> &[Transformation] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Transformation> {
        self.steps
    }

    /// The accumulated steps, or `None` if aborted or nothing happened.
    pub fn final_steps(self) -> Option<Vec<Transformation>> {
        if self.status == Status::Aborted || self.steps.is_empty() {
            None
        } else {
            Some(self.steps)
        }
    }
}

/// Inline any partial expression markers the last steps introduced, so that
/// producers downstream never see them. Runs between pipeline stages and
/// repetition rounds.
pub(crate) fn tidy_up(builder: &mut StepsBuilder<'_>) -> Result<(), EngineError> {
    for _ in 0..super::MAX_ITERATIONS {
        if !builder.in_progress() {
            return Ok(());
        }
        match crate::partial::inline_partial_expressions(&builder.expression()) {
            Some(step) => builder.add_step(step),
            None => return Ok(()),
        }
    }
    Err(EngineError::TooManyIterations {
        limit: super::MAX_ITERATIONS,
        expression: builder.expression().expr.to_string(),
    })
}
