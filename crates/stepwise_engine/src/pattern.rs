//! Structural patterns over expressions.
//!
//! Patterns drive method applicability. `find_matches` enumerates matches
//! lazily enough for callers that only need the first one; `min_depth` gives
//! a lower bound on the depth of any matching expression so deep visitors can
//! prune whole subtrees.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use stepwise_ast::{Expr, ExprKind};

use crate::context::Context;
use crate::subexpression::Subexpression;

/// The outcome of matching a pattern against a subexpression.
#[derive(Debug, Clone, Default)]
pub struct Match {
    /// Expressions bound by capture patterns, by capture name.
    pub bindings: FxHashMap<&'static str, Expr>,
    /// For n-ary patterns, the child indices matched, in increasing order.
    pub matched_children: Vec<usize>,
}

impl Match {
    pub fn empty() -> Self {
        Match::default()
    }

    pub fn binding(&self, name: &str) -> Option<&Expr> {
        self.bindings.get(name)
    }
}

pub trait Pattern: Send + Sync {
    /// All matches of this pattern against `sub`, in match order.
    fn find_matches(&self, ctx: &Context, sub: &Subexpression) -> Vec<Match>;

    /// Lower bound on the depth of a matching expression. Atoms have depth 1.
    fn min_depth(&self) -> usize {
        1
    }

    fn matches(&self, ctx: &Context, sub: &Subexpression) -> bool {
        !self.find_matches(ctx, sub).is_empty()
    }
}

/// Matches anything.
pub struct AnyPattern;

impl Pattern for AnyPattern {
    fn find_matches(&self, _ctx: &Context, _sub: &Subexpression) -> Vec<Match> {
        vec![Match::empty()]
    }
}

/// Matches a fixed expression, structurally.
pub struct FixedPattern {
    pub expr: Expr,
}

impl FixedPattern {
    pub fn new(expr: Expr) -> Self {
        FixedPattern { expr }
    }
}

impl Pattern for FixedPattern {
    fn find_matches(&self, _ctx: &Context, sub: &Subexpression) -> Vec<Match> {
        if sub.expr == self.expr {
            vec![Match::empty()]
        } else {
            Vec::new()
        }
    }

    fn min_depth(&self) -> usize {
        self.expr.depth()
    }
}

/// Matches any expression of a given shape, without looking at children.
pub struct KindPattern {
    pub name: &'static str,
    predicate: fn(&Expr) -> bool,
}

impl KindPattern {
    pub fn new(name: &'static str, predicate: fn(&Expr) -> bool) -> Self {
        KindPattern { name, predicate }
    }

    pub fn sum() -> Self {
        KindPattern::new("sum", Expr::is_sum)
    }

    pub fn product() -> Self {
        KindPattern::new("product", Expr::is_product)
    }

    pub fn integer() -> Self {
        KindPattern::new("integer", |e| matches!(e.kind(), ExprKind::Integer(_)))
    }

    pub fn variable() -> Self {
        KindPattern::new("variable", |e| matches!(e.kind(), ExprKind::Variable(_)))
    }
}

impl Pattern for KindPattern {
    fn find_matches(&self, _ctx: &Context, sub: &Subexpression) -> Vec<Match> {
        if (self.predicate)(&sub.expr) {
            vec![Match::empty()]
        } else {
            Vec::new()
        }
    }
}

/// Wraps another pattern and records what it matched under `name`.
pub struct CapturePattern {
    pub name: &'static str,
    inner: Arc<dyn Pattern>,
}

impl CapturePattern {
    pub fn new(name: &'static str, inner: Arc<dyn Pattern>) -> Self {
        CapturePattern { name, inner }
    }
}

impl Pattern for CapturePattern {
    fn find_matches(&self, ctx: &Context, sub: &Subexpression) -> Vec<Match> {
        let mut matches = self.inner.find_matches(ctx, sub);
        for m in &mut matches {
            m.bindings.insert(self.name, sub.expr.clone());
        }
        matches
    }

    fn min_depth(&self) -> usize {
        self.inner.min_depth()
    }
}

/// The n-ary operators a partial expression can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaryOperator {
    Sum,
    Product,
}

impl NaryOperator {
    pub fn matches(&self, expr: &Expr) -> bool {
        match self {
            NaryOperator::Sum => expr.is_sum(),
            NaryOperator::Product => expr.is_product(),
        }
    }

    /// Rebuild a node of this operator from operands.
    pub fn make(&self, operands: Vec<Expr>, forced_signs: Vec<usize>) -> Expr {
        match self {
            NaryOperator::Sum => Expr::sum(operands),
            NaryOperator::Product => Expr::product_with_signs(operands, forced_signs),
        }
    }
}

/// Matches a subset of the operands of a sum or product.
///
/// Each child pattern is assigned to one operand, with assigned indices
/// strictly increasing. Matches are enumerated with earlier operands
/// preferred for earlier child patterns.
pub struct NaryPattern {
    pub operator: NaryOperator,
    pub child_patterns: Vec<Arc<dyn Pattern>>,
}

impl NaryPattern {
    /// Panics if `child_patterns` is empty. A subset pattern with nothing to
    /// match is always a construction mistake.
    pub fn new(operator: NaryOperator, child_patterns: Vec<Arc<dyn Pattern>>) -> Self {
        assert!(
            !child_patterns.is_empty(),
            "an n-ary pattern needs at least one child pattern"
        );
        NaryPattern {
            operator,
            child_patterns,
        }
    }

    pub fn sum(child_patterns: Vec<Arc<dyn Pattern>>) -> Self {
        NaryPattern::new(NaryOperator::Sum, child_patterns)
    }

    pub fn product(child_patterns: Vec<Arc<dyn Pattern>>) -> Self {
        NaryPattern::new(NaryOperator::Product, child_patterns)
    }

    fn search(
        &self,
        ctx: &Context,
        sub: &Subexpression,
        pattern_index: usize,
        from_child: usize,
        chosen: &mut Vec<usize>,
        bindings: &FxHashMap<&'static str, Expr>,
        results: &mut Vec<Match>,
    ) {
        if pattern_index == self.child_patterns.len() {
            results.push(Match {
                bindings: bindings.clone(),
                matched_children: chosen.clone(),
            });
            return;
        }
        let remaining = self.child_patterns.len() - pattern_index;
        let last_start = sub.expr.child_count() - remaining;
        for index in from_child..=last_start {
            let Some(child) = sub.child(index) else {
                continue;
            };
            for m in self.child_patterns[pattern_index].find_matches(ctx, &child) {
                let mut merged = bindings.clone();
                merged.extend(m.bindings);
                chosen.push(index);
                self.search(ctx, sub, pattern_index + 1, index + 1, chosen, &merged, results);
                chosen.pop();
            }
        }
    }

    /// The expressions matched by this pattern's child patterns.
    pub fn matched_operands(&self, parent: &Expr, m: &Match) -> Vec<Expr> {
        m.matched_children
            .iter()
            .filter_map(|&i| parent.nth_child(i).cloned())
            .collect()
    }

    /// Build the partial expression made of the matched operands, as a node
    /// of the same operator. Forced multiplication signs travel with their
    /// factor, except into leading position where no sign can be displayed.
    pub fn extract(&self, parent: &Expr, m: &Match) -> Expr {
        let operands = self.matched_operands(parent, m);
        let mut forced_signs = Vec::new();
        if self.operator == NaryOperator::Product {
            for (new_index, &old_index) in m.matched_children.iter().enumerate() {
                if new_index > 0 && parent.forced_signs().contains(&old_index) {
                    forced_signs.push(new_index);
                }
            }
        }
        self.operator.make(operands, forced_signs)
    }

    /// Replace the matched operands with `replacement`, placed where the
    /// first matched operand was. Unmatched operands and their forced signs
    /// keep their relative order.
    pub fn substitute(&self, parent: &Expr, m: &Match, replacement: &Expr) -> Expr {
        let first_matched = match m.matched_children.first() {
            Some(&i) => i,
            None => return parent.clone(),
        };
        let mut operands = Vec::new();
        let mut forced_signs = Vec::new();
        for index in 0..parent.child_count() {
            let is_matched = m.matched_children.contains(&index);
            if is_matched && index != first_matched {
                continue;
            }
            let new_index = operands.len();
            if new_index > 0 && parent.forced_signs().contains(&index) {
                forced_signs.push(new_index);
            }
            if index == first_matched {
                operands.push(replacement.clone());
            } else if let Some(child) = parent.nth_child(index) {
                operands.push(child.clone());
            }
        }
        // The rebuilt node stands in for the parent and keeps its decoration
        // and label; the extracted subset stays bare.
        self.operator.make(operands, forced_signs).annotated_like(parent)
    }
}

impl Pattern for NaryPattern {
    fn find_matches(&self, ctx: &Context, sub: &Subexpression) -> Vec<Match> {
        if !self.operator.matches(&sub.expr)
            || sub.expr.child_count() < self.child_patterns.len()
        {
            return Vec::new();
        }
        let mut results = Vec::new();
        let mut chosen = Vec::with_capacity(self.child_patterns.len());
        self.search(
            ctx,
            sub,
            0,
            0,
            &mut chosen,
            &FxHashMap::default(),
            &mut results,
        );
        results
    }

    fn min_depth(&self) -> usize {
        1 + self
            .child_patterns
            .iter()
            .map(|p| p.min_depth())
            .max()
            .unwrap_or(0)
    }
}

/// Picks a subexpression of the input for a producer to work on.
pub trait Extractor: Send + Sync {
    fn extract(&self, sub: &Subexpression) -> Option<Subexpression>;
}

/// Extracts a fixed child by index.
pub struct ChildExtractor {
    pub index: usize,
}

impl Extractor for ChildExtractor {
    fn extract(&self, sub: &Subexpression) -> Option<Subexpression> {
        sub.child(self.index)
    }
}

/// Extracts the first node (prefix order) satisfying a predicate.
pub struct FindExtractor {
    predicate: fn(&Expr) -> bool,
}

impl FindExtractor {
    pub fn new(predicate: fn(&Expr) -> bool) -> Self {
        FindExtractor { predicate }
    }
}

impl Extractor for FindExtractor {
    fn extract(&self, sub: &Subexpression) -> Option<Subexpression> {
        let relative = sub.expr.find_first(&self.predicate)?;
        let mut path = sub.path.clone();
        path.extend(&relative);
        let mut expr = sub.expr.clone();
        for &index in &relative {
            expr = expr.nth_child(index as usize)?.clone();
        }
        Some(Subexpression::at(expr, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sum_abc() -> Subexpression {
        Subexpression::root(Expr::sum(vec![
            Expr::variable("a"),
            Expr::variable("b"),
            Expr::variable("c"),
        ]))
    }

    #[test]
    fn test_nary_subset_matches_in_order() {
        let ctx = Context::new();
        let pattern = NaryPattern::sum(vec![Arc::new(AnyPattern), Arc::new(AnyPattern)]);
        let matches = pattern.find_matches(&ctx, &sum_abc());
        let indices: Vec<_> = matches.iter().map(|m| m.matched_children.clone()).collect();
        assert_eq!(indices, vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
    }

    #[test]
    fn test_nary_extract_and_substitute() {
        let ctx = Context::new();
        let pattern = NaryPattern::sum(vec![
            Arc::new(FixedPattern::new(Expr::variable("a"))),
            Arc::new(FixedPattern::new(Expr::variable("c"))),
        ]);
        let sub = sum_abc();
        let m = &pattern.find_matches(&ctx, &sub)[0];

        let partial = pattern.extract(&sub.expr, m);
        assert_eq!(
            partial,
            Expr::sum(vec![Expr::variable("a"), Expr::variable("c")])
        );

        let substituted = pattern.substitute(&sub.expr, m, &Expr::variable("p"));
        assert_eq!(
            substituted,
            Expr::sum(vec![Expr::variable("p"), Expr::variable("b")])
        );
    }

    #[test]
    fn test_substitute_keeps_the_parent_decoration() {
        let ctx = Context::new();
        let parent = Expr::sum(vec![
            Expr::variable("a"),
            Expr::variable("b"),
            Expr::variable("c"),
        ])
        .decorated(stepwise_ast::Decorator::RoundBracket);
        let pattern = NaryPattern::sum(vec![Arc::new(FixedPattern::new(Expr::variable("a")))]);
        let sub = Subexpression::root(parent.clone());
        let m = &pattern.find_matches(&ctx, &sub)[0];

        let substituted = pattern.substitute(&parent, m, &Expr::variable("p"));
        assert_eq!(
            substituted.outer_bracket(),
            Some(stepwise_ast::Decorator::RoundBracket)
        );
        // The extracted subset is a fresh node; its marker is the caller's job.
        assert!(pattern.extract(&parent, m).decorators().is_empty());
    }

    #[test]
    fn test_product_substitute_reindexes_forced_signs() {
        let ctx = Context::new();
        // a * (sign)b * c, matching b
        let parent = Expr::product_with_signs(
            vec![
                Expr::variable("a"),
                Expr::variable("b"),
                Expr::variable("c"),
            ],
            vec![1],
        );
        let pattern = NaryPattern::product(vec![Arc::new(FixedPattern::new(Expr::variable(
            "b",
        )))]);
        let sub = Subexpression::root(parent.clone());
        let m = &pattern.find_matches(&ctx, &sub)[0];
        let substituted = pattern.substitute(&parent, m, &Expr::variable("p"));
        // The replacement lands where b was and keeps its forced sign.
        assert_eq!(substituted.forced_signs(), &[1]);
        assert_eq!(
            substituted.children(),
            vec![
                Expr::variable("a"),
                Expr::variable("p"),
                Expr::variable("c")
            ]
        );
    }

    #[test]
    fn test_capture_binds_expression() {
        let ctx = Context::new();
        let pattern = CapturePattern::new("term", Arc::new(KindPattern::integer()));
        let sub = Subexpression::root(Expr::integer(3));
        let matches = pattern.find_matches(&ctx, &sub);
        assert_eq!(matches[0].binding("term"), Some(&Expr::integer(3)));
    }

    #[test]
    fn test_find_extractor_keeps_path() {
        let sub = Subexpression::root(Expr::product(vec![
            Expr::variable("x"),
            Expr::sum(vec![Expr::integer(1), Expr::integer(2)]),
        ]));
        let extractor = FindExtractor::new(Expr::is_sum);
        let found = extractor.extract(&sub).unwrap();
        assert_eq!(found.path, vec![1]);
        assert_eq!(
            found.expr,
            Expr::sum(vec![Expr::integer(1), Expr::integer(2)])
        );
    }
}
