//! Context-sensitive selection, lock-step application, lazy producers and
//! cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use stepwise_ast::{Expr, ExprKind};
use stepwise_engine::producers::{
    in_step, lazy_steps, select_steps, steps, InStepItem, SelectableProducer, StepsProducer,
};
use stepwise_engine::context::{ResourceData, ResourceSelector};
use stepwise_engine::{
    Context, EngineError, FixedPattern, KindPattern, Metadata, Method, Rule, RuleResult,
    Subexpression, Transformation,
};

fn rewrite(name: &'static str, from: Expr, to: Expr) -> Method {
    Rule::new(name, Arc::new(FixedPattern::new(from)), move |_, _, _| {
        Some(RuleResult::new(to.clone(), Some(Metadata::new(name))))
    })
    .into_method()
}

fn run_in(ctx: &Context, producer: &StepsProducer, input: Expr) -> Option<Vec<Transformation>> {
    producer
        .produce_steps(ctx, &Subexpression::root(input))
        .unwrap()
}

struct TagSelector {
    wanted: &'static str,
}

impl ResourceSelector for TagSelector {
    fn select_index(&self, _default: &ResourceData, alternatives: &[&ResourceData]) -> Option<usize> {
        alternatives
            .iter()
            .position(|data| data.tags.contains(&self.wanted))
    }
}

fn selectable(tag: &'static str, to: &'static str) -> SelectableProducer {
    SelectableProducer {
        producer: Arc::new(
            rewrite("Test.Selected", Expr::variable("x"), Expr::variable(to)).into_steps(),
        ),
        resource_data: ResourceData::new(vec![tag]),
    }
}

#[test]
fn test_selector_defaults_without_a_selection_policy() {
    let producer = select_steps(
        selectable("default", "d"),
        vec![selectable("eu", "e"), selectable("us", "u")],
    );
    let ctx = Context::new();
    let steps = run_in(&ctx, &producer, Expr::variable("x")).unwrap();
    assert_eq!(steps[0].to_expr, Expr::variable("d"));
}

#[test]
fn test_selector_honors_the_context_policy() {
    let producer = select_steps(
        selectable("default", "d"),
        vec![selectable("eu", "e"), selectable("us", "u")],
    );
    let ctx = Context::new().with_resource_selector(Arc::new(TagSelector { wanted: "us" }));
    let steps = run_in(&ctx, &producer, Expr::variable("x")).unwrap();
    assert_eq!(steps[0].to_expr, Expr::variable("u"));

    // A policy that matches nothing keeps the default.
    let ctx = Context::new().with_resource_selector(Arc::new(TagSelector { wanted: "apac" }));
    let steps = run_in(&ctx, &producer, Expr::variable("x")).unwrap();
    assert_eq!(steps[0].to_expr, Expr::variable("d"));
}

#[test]
fn test_in_step_rewrites_all_children_as_one_step() {
    let drop_zero = Rule::new(
        "Test.DropZero",
        Arc::new(KindPattern::sum()),
        |_, sub, _| {
            let children = sub.expr.children();
            match children.as_slice() {
                [first, zero] if *zero == Expr::integer(0) => Some(RuleResult::new(
                    first.clone(),
                    Some(Metadata::new("Test.DropZero")),
                )),
                _ => None,
            }
        },
    )
    .into_method();

    let producer = in_step(vec![InStepItem {
        method: Arc::new(drop_zero),
        explanation: "Test.DropZeroEverywhere",
        optional: false,
    }]);

    // Both children are rewritten in lock-step, published as one step with
    // the per-child rewrites inside it.
    let input = Expr::product(vec![
        Expr::sum(vec![Expr::variable("a"), Expr::integer(0)]),
        Expr::sum(vec![Expr::variable("b"), Expr::integer(0)]),
    ]);
    let ctx = Context::new();
    let steps = run_in(&ctx, &producer, input).unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(
        steps[0].to_expr,
        Expr::product(vec![Expr::variable("a"), Expr::variable("b")])
    );
    assert_eq!(steps[0].steps.as_ref().map(Vec::len), Some(2));
    assert_eq!(
        steps[0].explanation.as_ref().map(|m| m.key),
        Some("Test.DropZeroEverywhere")
    );
}

#[test]
fn test_in_step_required_item_must_apply_to_every_child() {
    let drop_zero = rewrite(
        "Test.DropZero",
        Expr::sum(vec![Expr::variable("a"), Expr::integer(0)]),
        Expr::variable("a"),
    );
    let producer = in_step(vec![InStepItem {
        method: Arc::new(drop_zero),
        explanation: "Test.DropZeroEverywhere",
        optional: false,
    }]);

    let input = Expr::product(vec![
        Expr::sum(vec![Expr::variable("a"), Expr::integer(0)]),
        Expr::variable("b"),
    ]);
    let ctx = Context::new();
    assert!(run_in(&ctx, &producer, input).is_none());
}

#[test]
fn test_lazy_producer_is_built_once_on_first_use() {
    static BUILDS: AtomicUsize = AtomicUsize::new(0);
    let producer = lazy_steps(|| {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        rewrite("Test.Rename", Expr::variable("x"), Expr::variable("y")).into_steps()
    });

    let ctx = Context::new();
    assert_eq!(BUILDS.load(Ordering::SeqCst), 0);
    assert!(run_in(&ctx, &producer, Expr::variable("x")).is_some());
    assert!(run_in(&ctx, &producer, Expr::variable("x")).is_some());
    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_lazy_enables_recursive_plan_graphs() {
    // peel: n -> n - 1 for n > 0, recursing on the result until 0.
    fn peel() -> StepsProducer {
        let decrement = Rule::new(
            "Test.Decrement",
            Arc::new(KindPattern::integer()),
            |_, sub, _| match sub.expr.kind() {
                ExprKind::Integer(n) if *n > 0 => Some(RuleResult::new(
                    Expr::integer(n - 1),
                    Some(Metadata::new("Test.Decrement")),
                )),
                _ => None,
            },
        )
        .into_method();
        steps()
            .apply(decrement.into_steps())
            .optionally(lazy_steps(peel))
            .build()
    }

    let ctx = Context::new();
    let steps = run_in(&ctx, &peel(), Expr::integer(3)).unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[2].to_expr, Expr::integer(0));
}

#[test]
fn test_cancellation_interrupts_method_entry() {
    let method = rewrite("Test.Rename", Expr::variable("x"), Expr::variable("y"));
    let ctx = Context::new().with_active_check(Arc::new(|| false));
    let result = method.try_execute(&ctx, &Subexpression::root(Expr::variable("x")));
    assert!(matches!(result, Err(EngineError::Interrupted)));
}
