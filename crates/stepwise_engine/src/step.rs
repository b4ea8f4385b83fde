//! The output side of the engine: transformations, tasks and their tags.

use stepwise_ast::Expr;

use crate::metadata::Metadata;
use crate::strategy::Strategy;
use crate::subexpression::Subexpression;

/// What kind of method produced a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    /// A single atomic rewrite with no inner steps.
    Rule,
    /// A composite rewrite explained by its inner steps.
    Plan,
    /// A rewrite explained by a list of tasks on auxiliary expressions.
    TaskSet,
}

/// Presentation hints attached to a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Only reorders operands; no mathematical content.
    Rearrangement,
    /// Notation cleanup.
    Cosmetic,
    /// Correct but usually skipped in presentations.
    Pedantic,
    /// Internal bookkeeping step that renderers should hide entirely.
    InvisibleChange,
}

/// A single explained rewrite of a subexpression.
///
/// `from_expr` is anchored: its path says where inside the original input the
/// rewrite happened. For composite kinds either `steps` or `tasks` holds the
/// breakdown.
#[derive(Debug, Clone)]
pub struct Transformation {
    pub kind: TransformationKind,
    pub from_expr: Subexpression,
    pub to_expr: Expr,
    pub steps: Option<Vec<Transformation>>,
    pub tasks: Option<Vec<Task>>,
    pub explanation: Option<Metadata>,
    pub skills: Vec<Metadata>,
    pub tags: Vec<Tag>,
    /// Lower-ranked outcomes a strategy runner also found. Presentation
    /// material only; `to_expr` always comes from the main line.
    pub alternatives: Vec<Alternative>,
}

impl Transformation {
    pub fn rule(from_expr: Subexpression, to_expr: Expr, explanation: Option<Metadata>) -> Self {
        Transformation {
            kind: TransformationKind::Rule,
            from_expr,
            to_expr,
            steps: None,
            tasks: None,
            explanation,
            skills: Vec::new(),
            tags: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn rule_with_tags(
        from_expr: Subexpression,
        to_expr: Expr,
        explanation: Option<Metadata>,
        tags: Vec<Tag>,
    ) -> Self {
        Transformation {
            tags,
            ..Transformation::rule(from_expr, to_expr, explanation)
        }
    }

    pub fn plan(
        from_expr: Subexpression,
        to_expr: Expr,
        steps: Vec<Transformation>,
        explanation: Option<Metadata>,
        skills: Vec<Metadata>,
    ) -> Self {
        Transformation {
            kind: TransformationKind::Plan,
            from_expr,
            to_expr,
            steps: Some(steps),
            tasks: None,
            explanation,
            skills,
            tags: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn task_set(
        from_expr: Subexpression,
        to_expr: Expr,
        tasks: Vec<Task>,
        explanation: Option<Metadata>,
        skills: Vec<Metadata>,
    ) -> Self {
        Transformation {
            kind: TransformationKind::TaskSet,
            from_expr,
            to_expr,
            steps: None,
            tasks: Some(tasks),
            explanation,
            skills,
            tags: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Copy of this transformation with new endpoints, keeping its breakdown
    /// and metadata. Used when a step is re-anchored onto an enclosing
    /// expression.
    pub(crate) fn re_anchored(&self, from_expr: Subexpression, to_expr: Expr) -> Self {
        Transformation {
            from_expr,
            to_expr,
            ..self.clone()
        }
    }

    /// Copy with all scratch labels removed from both endpoints and all inner
    /// steps.
    pub fn clear_labels(&self) -> Self {
        Transformation {
            from_expr: self.from_expr.with_expr(self.from_expr.expr.clear_labels()),
            to_expr: self.to_expr.clear_labels(),
            steps: self
                .steps
                .as_ref()
                .map(|steps| steps.iter().map(Transformation::clear_labels).collect()),
            ..self.clone()
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// One piece of work on an auxiliary expression, owned by a task set.
#[derive(Debug, Clone)]
pub struct Task {
    /// Sequential id of the form `"#1"`, `"#2"`, ... within its task set.
    pub task_id: String,
    pub start_expr: Expr,
    pub explanation: Metadata,
    pub steps: Vec<Transformation>,
    /// Ids of earlier tasks this one builds on. Bookkeeping for renderers;
    /// execution order is the declaration order.
    pub depends_on: Vec<String>,
}

impl Task {
    /// The task's result: where its steps ended up, or its start expression
    /// if it has none.
    pub fn to_expr(&self) -> Expr {
        self.steps
            .last()
            .map(|step| step.to_expr.clone())
            .unwrap_or_else(|| self.start_expr.clone())
    }
}

/// A runner-up outcome recorded by a strategy runner.
#[derive(Debug, Clone)]
pub struct Alternative {
    pub strategy: Strategy,
    pub steps: Vec<Transformation>,
}
