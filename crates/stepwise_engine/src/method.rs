//! Methods: the executable units of the engine.
//!
//! A method maps a subexpression to a single explained transformation.
//! The set of method kinds is closed; authors compose them through the
//! builders in [`crate::plan`], [`crate::task_set`] and [`crate::strategy`]
//! rather than by implementing a trait.

use std::fmt;
use std::sync::Arc;

use stepwise_ast::Expr;

use crate::context::{Context, Resource, ResourceData};
use crate::error::EngineError;
use crate::metadata::Metadata;
use crate::partial::{self, PartialExpressionPlan};
use crate::pattern::{Match, Pattern};
use crate::plan::Plan;
use crate::producers::StepsProducer;
use crate::step::{Tag, Transformation};
use crate::strategy::StrategyRunner;
use crate::subexpression::Subexpression;
use crate::task_set::{PartialExpressionTaskSet, TaskSet};

/// `Ok(Some(transformation))` on success, `Ok(None)` when inapplicable.
pub type ExecuteResult = Result<Option<Transformation>, EngineError>;

pub enum Method {
    Rule(Rule),
    Plan(Plan),
    PartialExpressionPlan(PartialExpressionPlan),
    TaskSet(TaskSet),
    PartialExpressionTaskSet(PartialExpressionTaskSet),
    /// Flattens one partial expression marker back into its parent.
    InlinePartialExpressions,
    StrategyRunner(StrategyRunner),
    ContextSensitiveSelector(MethodSelector),
}

impl Method {
    /// Execute this method. The cancellation check runs here, at method
    /// entry, and nowhere else.
    pub fn try_execute(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        ctx.require_active()?;
        match self {
            Method::Rule(rule) => rule.run(ctx, sub),
            Method::Plan(plan) => plan.run(ctx, sub),
            Method::PartialExpressionPlan(plan) => plan.run(ctx, sub),
            Method::TaskSet(task_set) => task_set.run(ctx, sub),
            Method::PartialExpressionTaskSet(task_set) => task_set.run(ctx, sub),
            Method::InlinePartialExpressions => Ok(partial::inline_partial_expressions(sub)),
            Method::StrategyRunner(runner) => runner.run(ctx, sub),
            Method::ContextSensitiveSelector(selector) => selector.run(ctx, sub),
        }
    }

    pub fn min_depth(&self) -> usize {
        match self {
            Method::Rule(rule) => rule.min_depth(),
            Method::Plan(plan) => plan.min_depth(),
            Method::PartialExpressionPlan(plan) => plan.min_depth(),
            Method::TaskSet(task_set) => task_set.min_depth(),
            Method::PartialExpressionTaskSet(task_set) => task_set.min_depth(),
            Method::InlinePartialExpressions => 2,
            Method::StrategyRunner(runner) => runner.min_depth(),
            Method::ContextSensitiveSelector(selector) => selector.min_depth(),
        }
    }

    /// Use this method where a steps producer is expected; its
    /// transformation becomes a single step.
    pub fn into_steps(self) -> StepsProducer {
        StepsProducer::Method(Arc::new(self))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Rule(rule) => write!(f, "Rule({})", rule.name),
            Method::Plan(_) => write!(f, "Plan"),
            Method::PartialExpressionPlan(_) => write!(f, "PartialExpressionPlan"),
            Method::TaskSet(_) => write!(f, "TaskSet"),
            Method::PartialExpressionTaskSet(_) => write!(f, "PartialExpressionTaskSet"),
            Method::InlinePartialExpressions => write!(f, "InlinePartialExpressions"),
            Method::StrategyRunner(_) => write!(f, "StrategyRunner"),
            Method::ContextSensitiveSelector(_) => write!(f, "ContextSensitiveSelector"),
        }
    }
}

/// What a rule's transform produces when it fires.
pub struct RuleResult {
    pub to_expr: Expr,
    pub explanation: Option<Metadata>,
    pub skills: Vec<Metadata>,
    pub tags: Vec<Tag>,
}

impl RuleResult {
    pub fn new(to_expr: Expr, explanation: Option<Metadata>) -> Self {
        RuleResult {
            to_expr,
            explanation,
            skills: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_skills(mut self, skills: Vec<Metadata>) -> Self {
        self.skills = skills;
        self
    }
}

type RuleTransform =
    dyn Fn(&Context, &Subexpression, &Match) -> Option<RuleResult> + Send + Sync;

/// An atomic rewrite: a pattern plus a transform. Matches are tried in match
/// order; the first one the transform accepts wins. The transform returning
/// `None` vetoes a structural match.
pub struct Rule {
    pub name: &'static str,
    pattern: Arc<dyn Pattern>,
    transform: Arc<RuleTransform>,
}

impl Rule {
    pub fn new<F>(name: &'static str, pattern: Arc<dyn Pattern>, transform: F) -> Self
    where
        F: Fn(&Context, &Subexpression, &Match) -> Option<RuleResult> + Send + Sync + 'static,
    {
        Rule {
            name,
            pattern,
            transform: Arc::new(transform),
        }
    }

    pub fn into_method(self) -> Method {
        Method::Rule(self)
    }

    fn min_depth(&self) -> usize {
        self.pattern.min_depth()
    }

    fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        for m in self.pattern.find_matches(ctx, sub) {
            if let Some(result) = (self.transform)(ctx, sub, &m) {
                let mut step = Transformation::rule(sub.clone(), result.to_expr, result.explanation);
                step.skills = result.skills;
                step.tags = result.tags;
                return Ok(Some(step));
            }
        }
        Ok(None)
    }
}

/// A selectable method with the descriptor the embedder keys selection on.
pub struct SelectableMethod {
    pub method: Arc<Method>,
    pub resource_data: ResourceData,
}

impl Resource for SelectableMethod {
    fn resource_data(&self) -> &ResourceData {
        &self.resource_data
    }
}

/// Context-sensitive choice between whole methods, mirroring
/// [`crate::producers::ContextSensitiveSelector`] at the method level.
pub struct MethodSelector {
    pub default: SelectableMethod,
    pub alternatives: Vec<SelectableMethod>,
}

impl MethodSelector {
    pub fn new(default: SelectableMethod, alternatives: Vec<SelectableMethod>) -> Self {
        MethodSelector {
            default,
            alternatives,
        }
    }

    fn min_depth(&self) -> usize {
        self.alternatives
            .iter()
            .map(|a| a.method.min_depth())
            .chain([self.default.method.min_depth()])
            .min()
            .unwrap_or(1)
    }

    fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        let selected = ctx.select_best_resource(&self.default, &self.alternatives);
        selected.method.try_execute(ctx, sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::FixedPattern;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rule_applies_first_accepted_match() {
        let ctx = Context::new();
        let rule = Rule::new(
            "EliminateZero",
            Arc::new(FixedPattern::new(Expr::integer(0))),
            |_, _, _| {
                Some(RuleResult::new(
                    Expr::variable("zero"),
                    Some(Metadata::new("Test.EliminateZero")),
                ))
            },
        );
        let method = rule.into_method();

        let hit = method
            .try_execute(&ctx, &Subexpression::root(Expr::integer(0)))
            .unwrap()
            .unwrap();
        assert_eq!(hit.to_expr, Expr::variable("zero"));
        assert_eq!(hit.explanation.as_ref().map(|m| m.key), Some("Test.EliminateZero"));

        let miss = method
            .try_execute(&ctx, &Subexpression::root(Expr::integer(1)))
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_transform_can_veto_a_structural_match() {
        let ctx = Context::new();
        let rule = Rule::new(
            "NeverFires",
            Arc::new(FixedPattern::new(Expr::integer(0))),
            |_, _, _| None,
        );
        let miss = rule
            .into_method()
            .try_execute(&ctx, &Subexpression::root(Expr::integer(0)))
            .unwrap();
        assert!(miss.is_none());
    }
}
