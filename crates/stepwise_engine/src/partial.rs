//! Partial expressions: working on a subset of a sum's or product's operands.
//!
//! The extracted subset is wrapped in a partial bracket marker while steps
//! run on it, then flattened back into the parent. Markers are pure
//! bookkeeping; every published result has had them inlined away.

use std::sync::Arc;

use stepwise_ast::{Decorator, Expr};

use crate::context::Context;
use crate::metadata::{keys, Metadata, MetadataKey, MetadataMaker};
use crate::method::{ExecuteResult, Method};
use crate::pattern::{NaryOperator, NaryPattern, Pattern};
use crate::plan::{plan, Plan};
use crate::producers::{StepsBuilder, StepsProducer};
use crate::step::{Tag, Transformation};
use crate::subexpression::Subexpression;

/// A plan whose pattern matches a subset of an n-ary node's operands and
/// whose steps run on just that subset.
pub struct PartialExpressionPlan {
    pattern: Arc<NaryPattern>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
    steps: Arc<StepsProducer>,
    /// Used unchanged when a match covers every operand.
    whole: Plan,
}

impl PartialExpressionPlan {
    pub(crate) fn new(
        pattern: Arc<NaryPattern>,
        explanation: MetadataMaker,
        skill_makers: Vec<MetadataMaker>,
        steps: Arc<StepsProducer>,
        whole: Plan,
    ) -> Self {
        PartialExpressionPlan {
            pattern,
            explanation,
            skill_makers,
            steps,
            whole,
        }
    }

    pub(crate) fn min_depth(&self) -> usize {
        self.pattern.min_depth().max(self.steps.min_depth())
    }

    pub(crate) fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        ctx.unless_previously_failed(
            self as *const PartialExpressionPlan as usize,
            &sub.expr,
            || self.execute(ctx, sub),
        )
    }

    fn execute(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        for m in self.pattern.find_matches(ctx, sub) {
            if m.matched_children.len() == sub.expr.child_count() {
                // Full cover: no extraction needed.
                if let Some(step) = self.whole.run(ctx, sub)? {
                    return Ok(Some(step));
                }
                continue;
            }

            let partial = self.pattern.extract(&sub.expr, &m);
            let marked = partial.decorated(Decorator::PartialBracket);
            let substituted = self.pattern.substitute(&sub.expr, &m, &marked);

            let mut builder = StepsBuilder::new(ctx, sub.clone());
            builder.add_step(if is_contiguous(&m.matched_children) {
                Transformation::rule_with_tags(
                    sub.clone(),
                    substituted,
                    Some(Metadata::new(keys::EXTRACT_PARTIAL_EXPRESSION)),
                    vec![Tag::InvisibleChange],
                )
            } else {
                let key = match self.pattern.operator {
                    NaryOperator::Sum => keys::REARRANGE_SUM,
                    NaryOperator::Product => keys::REARRANGE_PRODUCT,
                };
                Transformation::rule_with_tags(
                    sub.clone(),
                    substituted,
                    Some(Metadata::with_params(key, vec![partial.clone()])),
                    vec![Tag::Rearrangement],
                )
            });

            let current = builder.expression();
            let Some(target) = find_partial_child(&current) else {
                continue;
            };
            if let Some(steps) = self.steps.produce_steps(ctx, &target)? {
                builder.add_steps(steps);
                crate::producers::builder::tidy_up(&mut builder)?;
                let to_expr = builder.expression().expr;
                if let Some(all_steps) = builder.final_steps() {
                    let explanation = self.explanation.make(ctx, sub, &m);
                    let skills = self
                        .skill_makers
                        .iter()
                        .map(|maker| maker.make(ctx, sub, &m))
                        .collect();
                    return Ok(Some(Transformation::plan(
                        sub.clone(),
                        to_expr,
                        all_steps,
                        Some(explanation),
                        skills,
                    )));
                }
            }
        }
        Ok(None)
    }
}

/// Restriction of [`PartialExpressionPlan`] to sums, for call sites that
/// should reject products at construction time. Panics on a non-sum pattern.
pub fn partial_sum_plan(
    explanation: MetadataKey,
    pattern: NaryPattern,
    steps: StepsProducer,
) -> Method {
    assert!(
        pattern.operator == NaryOperator::Sum,
        "a partial sum plan needs a sum pattern"
    );
    plan(explanation)
        .nary_pattern(pattern)
        .partial_expression_steps(steps)
}

fn is_contiguous(indices: &[usize]) -> bool {
    indices.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

fn find_partial_child(sub: &Subexpression) -> Option<Subexpression> {
    (0..sub.expr.child_count()).find_map(|i| {
        let child = sub.child(i)?;
        if child.expr.outer_bracket() == Some(Decorator::PartialBracket) {
            Some(child)
        } else {
            None
        }
    })
}

/// Find the first partial expression marker (prefix order) and flatten it
/// back into its parent, returning the corresponding bookkeeping step.
/// `None` when the expression carries no marker.
pub fn inline_partial_expressions(sub: &Subexpression) -> Option<Transformation> {
    if let Some(step) = inline_at(sub) {
        return Some(step);
    }
    for child in sub.children() {
        if let Some(step) = inline_partial_expressions(&child) {
            return Some(step);
        }
    }
    None
}

/// A child is inlinable when it is a partially-bracketed node of the same
/// operator as its parent and carries no label that would need preserving.
fn inlinable_child(parent: &Expr, child: &Expr) -> bool {
    child.outer_bracket() == Some(Decorator::PartialBracket)
        && child.label().is_none()
        && ((parent.is_sum() && child.is_sum()) || (parent.is_product() && child.is_product()))
}

fn inline_at(sub: &Subexpression) -> Option<Transformation> {
    let parent = &sub.expr;
    let index = (0..parent.child_count()).find(|&i| {
        parent
            .nth_child(i)
            .map_or(false, |child| inlinable_child(parent, child))
    })?;

    let (flattened, key) = if parent.is_sum() {
        (inline_sum(parent, index), keys::INLINE_PARTIAL_SUM)
    } else {
        (inline_product(parent, index), keys::INLINE_PARTIAL_PRODUCT)
    };

    Some(Transformation::rule_with_tags(
        sub.clone(),
        flattened,
        Some(Metadata::new(key)),
        vec![Tag::InvisibleChange],
    ))
}

fn inline_sum(parent: &Expr, index: usize) -> Expr {
    let mut terms = Vec::with_capacity(parent.child_count() + 1);
    for (i, child) in parent.children().into_iter().enumerate() {
        if i == index {
            terms.extend(child.children());
        } else {
            terms.push(child);
        }
    }
    // The parent's own decoration and label survive the flattening.
    Expr::sum(terms).annotated_like(parent)
}

/// Splicing a partial product into its parent shifts factor positions, so
/// forced multiplication signs on both levels are re-indexed onto the new
/// positions. A sign can never land on the leading factor.
fn inline_product(parent: &Expr, index: usize) -> Expr {
    let mut factors = Vec::with_capacity(parent.child_count() + 1);
    let mut forced_signs = Vec::new();
    for (i, child) in parent.children().into_iter().enumerate() {
        if i == index {
            let offset = factors.len();
            if offset > 0 && parent.forced_signs().contains(&i) {
                forced_signs.push(offset);
            }
            for inner_sign in child.forced_signs() {
                let new_index = offset + inner_sign;
                if new_index > 0 {
                    forced_signs.push(new_index);
                }
            }
            factors.extend(child.children());
        } else {
            let new_index = factors.len();
            if new_index > 0 && parent.forced_signs().contains(&i) {
                forced_signs.push(new_index);
            }
            factors.push(child);
        }
    }
    forced_signs.sort_unstable();
    forced_signs.dedup();
    Expr::product_with_signs(factors, forced_signs).annotated_like(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn partial_sum(terms: Vec<Expr>) -> Expr {
        Expr::sum(terms).decorated(Decorator::PartialBracket)
    }

    #[test]
    fn test_inline_partial_sum_flattens_in_place() {
        // 1 + <.2 + 3.> + x
        let expr = Expr::sum(vec![
            Expr::integer(1),
            partial_sum(vec![Expr::integer(2), Expr::integer(3)]),
            Expr::variable("x"),
        ]);
        let step = inline_partial_expressions(&Subexpression::root(expr)).unwrap();
        assert_eq!(
            step.to_expr,
            Expr::sum(vec![
                Expr::integer(1),
                Expr::integer(2),
                Expr::integer(3),
                Expr::variable("x"),
            ])
        );
        assert!(step.has_tag(Tag::InvisibleChange));
    }

    #[test]
    fn test_inline_partial_product_reindexes_forced_signs() {
        // a * <.b (sign)c.> * (sign)d, marker at index 1
        let partial = Expr::product_with_signs(
            vec![Expr::variable("b"), Expr::variable("c")],
            vec![1],
        )
        .decorated(Decorator::PartialBracket);
        let expr = Expr::product_with_signs(
            vec![Expr::variable("a"), partial, Expr::variable("d")],
            vec![2],
        );
        let step = inline_partial_expressions(&Subexpression::root(expr)).unwrap();
        // a * b (sign)c (sign)d with signs moved to the new positions
        assert_eq!(step.to_expr.forced_signs(), &[2, 3]);
        assert_eq!(
            step.to_expr.children(),
            vec![
                Expr::variable("a"),
                Expr::variable("b"),
                Expr::variable("c"),
                Expr::variable("d"),
            ]
        );
    }

    #[test]
    fn test_inline_finds_markers_deep_in_the_tree() {
        // x ^ (1 + <.2 + 3.>)
        let exponent = Expr::sum(vec![
            Expr::integer(1),
            partial_sum(vec![Expr::integer(2), Expr::integer(3)]),
        ]);
        let expr = Expr::power(Expr::variable("x"), exponent);
        let step = inline_partial_expressions(&Subexpression::root(expr)).unwrap();
        // Anchored at the exponent, not at the root.
        assert_eq!(step.from_expr.path, vec![1]);
    }

    #[test]
    fn test_inline_keeps_the_parent_decoration_and_label() {
        // (1 + <.2 + 3.>): the step is invisible, so the visible bracket and
        // the label on the sum itself must survive the flattening.
        let expr = Expr::sum(vec![
            Expr::integer(1),
            partial_sum(vec![Expr::integer(2), Expr::integer(3)]),
        ])
        .decorated(Decorator::RoundBracket)
        .with_label(stepwise_ast::Label::B);
        let step = inline_partial_expressions(&Subexpression::root(expr)).unwrap();
        assert_eq!(step.to_expr.outer_bracket(), Some(Decorator::RoundBracket));
        assert_eq!(step.to_expr.label(), Some(stepwise_ast::Label::B));
        assert_eq!(
            step.to_expr.undecorated().clear_labels(),
            Expr::sum(vec![Expr::integer(1), Expr::integer(2), Expr::integer(3)])
        );
    }

    #[test]
    fn test_inline_product_keeps_the_parent_decoration() {
        let partial = Expr::product(vec![Expr::variable("b"), Expr::variable("c")])
            .decorated(Decorator::PartialBracket);
        let expr = Expr::product(vec![Expr::variable("a"), partial])
            .decorated(Decorator::RoundBracket);
        let step = inline_partial_expressions(&Subexpression::root(expr)).unwrap();
        assert_eq!(step.to_expr.outer_bracket(), Some(Decorator::RoundBracket));
        assert_eq!(
            step.to_expr.children(),
            vec![Expr::variable("a"), Expr::variable("b"), Expr::variable("c")]
        );
    }

    #[test]
    fn test_labelled_markers_are_not_inlined() {
        let labelled = partial_sum(vec![Expr::integer(2), Expr::integer(3)])
            .with_label(stepwise_ast::Label::A);
        let expr = Expr::sum(vec![Expr::integer(1), labelled]);
        assert!(inline_partial_expressions(&Subexpression::root(expr)).is_none());
    }
}
