//! Plans: composite methods explained by their inner steps.

use std::sync::Arc;

use crate::context::Context;
use crate::metadata::{MetadataKey, MetadataMaker};
use crate::method::{ExecuteResult, Method};
use crate::partial::PartialExpressionPlan;
use crate::pattern::{AnyPattern, NaryPattern, Pattern};
use crate::producers::StepsProducer;
use crate::step::Transformation;
use crate::subexpression::Subexpression;

/// A steps producer promoted to a method: an applicability pattern, an
/// explanation and an optional gate on the result.
pub struct Plan {
    pattern: Arc<dyn Pattern>,
    result_pattern: Arc<dyn Pattern>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
    steps: Arc<StepsProducer>,
}

impl Plan {
    pub(crate) fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        ctx.unless_previously_failed(self as *const Plan as usize, &sub.expr, || {
            self.execute(ctx, sub)
        })
    }

    fn execute(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        let Some(m) = self.pattern.find_matches(ctx, sub).into_iter().next() else {
            return Ok(None);
        };
        let Some(steps) = self.steps.produce_steps(ctx, sub)? else {
            return Ok(None);
        };
        if steps.is_empty() {
            return Ok(None);
        }
        let to_expr = match steps.last() {
            Some(last) => last.to_expr.clone(),
            None => return Ok(None),
        };
        // The result gate never blocks an undefined outcome: "this has no
        // value" is always a valid answer.
        if !to_expr.is_undefined() && !self.result_pattern.matches(ctx, &sub.with_expr(to_expr.clone()))
        {
            return Ok(None);
        }
        let steps = hoist_pass_through(steps);
        let explanation = self.explanation.make(ctx, sub, &m);
        let skills = self
            .skill_makers
            .iter()
            .map(|maker| maker.make(ctx, sub, &m))
            .collect();
        Ok(Some(Transformation::plan(
            sub.clone(),
            to_expr,
            steps,
            Some(explanation),
            skills,
        )))
    }

    pub(crate) fn min_depth(&self) -> usize {
        self.pattern.min_depth().max(self.steps.min_depth())
    }
}

/// A single unexplained composite step adds nothing between the plan and its
/// sub-steps; hoist the sub-steps in its place.
fn hoist_pass_through(steps: Vec<Transformation>) -> Vec<Transformation> {
    if steps.len() == 1 && steps[0].explanation.is_none() && steps[0].skills.is_empty() {
        if let Some(inner) = &steps[0].steps {
            if !inner.is_empty() {
                return inner.clone();
            }
        }
    }
    steps
}

/// Start building a plan with a fixed explanation key.
pub fn plan(explanation: MetadataKey) -> PlanBuilder {
    PlanBuilder {
        pattern: Arc::new(AnyPattern),
        nary_pattern: None,
        result_pattern: Arc::new(AnyPattern),
        explanation: MetadataMaker::FixedKey(explanation),
        skill_makers: Vec::new(),
    }
}

pub struct PlanBuilder {
    pattern: Arc<dyn Pattern>,
    nary_pattern: Option<Arc<NaryPattern>>,
    result_pattern: Arc<dyn Pattern>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
}

impl PlanBuilder {
    pub fn pattern(mut self, pattern: Arc<dyn Pattern>) -> Self {
        self.pattern = pattern;
        self
    }

    /// Set an n-ary pattern, keeping hold of its operand structure. Required
    /// before [`PlanBuilder::partial_expression_steps`].
    pub fn nary_pattern(mut self, pattern: NaryPattern) -> Self {
        let pattern = Arc::new(pattern);
        self.pattern = pattern.clone();
        self.nary_pattern = Some(pattern);
        self
    }

    pub fn result_pattern(mut self, pattern: Arc<dyn Pattern>) -> Self {
        self.result_pattern = pattern;
        self
    }

    pub fn explanation_maker(mut self, maker: MetadataMaker) -> Self {
        self.explanation = maker;
        self
    }

    pub fn skill(mut self, maker: MetadataMaker) -> Self {
        self.skill_makers.push(maker);
        self
    }

    /// Finish as an ordinary plan.
    pub fn steps(self, producer: StepsProducer) -> Method {
        Method::Plan(Plan {
            pattern: self.pattern,
            result_pattern: self.result_pattern,
            explanation: self.explanation,
            skill_makers: self.skill_makers,
            steps: Arc::new(producer),
        })
    }

    /// Finish as a partial expression plan: the steps run on the subset of
    /// operands the n-ary pattern matched, extracted into a marked
    /// subexpression. Panics unless an n-ary pattern was set; any other
    /// pattern cannot delimit a partial expression.
    pub fn partial_expression_steps(self, producer: StepsProducer) -> Method {
        let nary = self
            .nary_pattern
            .clone()
            .unwrap_or_else(|| panic!("a partial expression plan needs an n-ary pattern"));
        let producer = Arc::new(producer);
        let whole = Plan {
            pattern: self.pattern,
            result_pattern: self.result_pattern,
            explanation: self.explanation.clone(),
            skill_makers: self.skill_makers.clone(),
            steps: producer.clone(),
        };
        Method::PartialExpressionPlan(PartialExpressionPlan::new(
            nary,
            self.explanation,
            self.skill_makers,
            producer,
            whole,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use pretty_assertions::assert_eq;
    use stepwise_ast::Expr;

    fn rule_step(name: &'static str, from: Expr, to: Expr) -> Transformation {
        Transformation::rule(Subexpression::root(from), to, Some(Metadata::new(name)))
    }

    #[test]
    fn test_single_unexplained_composite_step_is_hoisted() {
        let inner = vec![
            rule_step("Test.A", Expr::variable("x"), Expr::variable("y")),
            rule_step("Test.B", Expr::variable("y"), Expr::variable("z")),
        ];
        let wrapper = Transformation::plan(
            Subexpression::root(Expr::variable("x")),
            Expr::variable("z"),
            inner,
            None,
            Vec::new(),
        );
        let hoisted = hoist_pass_through(vec![wrapper]);
        assert_eq!(hoisted.len(), 2);
        assert_eq!(hoisted[0].to_expr, Expr::variable("y"));
        assert_eq!(hoisted[1].to_expr, Expr::variable("z"));
    }

    #[test]
    fn test_explained_composite_step_is_kept_as_is() {
        let inner = vec![rule_step("Test.A", Expr::variable("x"), Expr::variable("y"))];
        let wrapper = Transformation::plan(
            Subexpression::root(Expr::variable("x")),
            Expr::variable("y"),
            inner,
            Some(Metadata::new("Test.Wrapper")),
            Vec::new(),
        );
        let hoisted = hoist_pass_through(vec![wrapper]);
        assert_eq!(hoisted.len(), 1);
        assert_eq!(
            hoisted[0].explanation.as_ref().map(|m| m.key),
            Some("Test.Wrapper")
        );
    }

    #[test]
    fn test_multiple_steps_are_never_hoisted() {
        let steps = vec![
            rule_step("Test.A", Expr::variable("x"), Expr::variable("y")),
            rule_step("Test.B", Expr::variable("y"), Expr::variable("z")),
        ];
        let hoisted = hoist_pass_through(steps);
        assert_eq!(hoisted.len(), 2);
        assert_eq!(
            hoisted[0].explanation.as_ref().map(|m| m.key),
            Some("Test.A")
        );
    }
}
