//! Strategy arbitration: families, priorities, preferences and fallbacks.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use stepwise_ast::Expr;
use stepwise_engine::{
    strategy_runner, Context, FixedPattern, Metadata, Method, Rule, RuleResult, Strategy,
    StrategySelectionMode, Subexpression, Transformation,
};

const CLASS: &str = "EquationSolving";

fn rewrite(name: &'static str, from: Expr, to: Expr) -> Method {
    Rule::new(name, Arc::new(FixedPattern::new(from)), move |_, _, _| {
        Some(RuleResult::new(to.clone(), Some(Metadata::new(name))))
    })
    .into_method()
}

fn strategy(
    name: &'static str,
    family: &'static str,
    priority: i32,
    from: Expr,
    to: Expr,
) -> Strategy {
    Strategy::new(
        CLASS,
        name,
        family,
        priority,
        "Test.Strategy",
        rewrite("Test.StrategyStep", from, to).into_steps(),
    )
}

fn execute(ctx: &Context, method: &Method, input: Expr) -> Option<Transformation> {
    method
        .try_execute(ctx, &Subexpression::root(input))
        .unwrap()
}

#[test]
fn test_applying_a_strategy_excludes_its_family() {
    // Both strategies attack the same way; the second never gets a turn.
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Isolate",
            "direct",
            10,
            Expr::variable("x"),
            Expr::variable("a"),
        ))
        .option(strategy(
            "IsolateHarder",
            "direct",
            20,
            Expr::variable("x"),
            Expr::variable("b"),
        ))
        .build();

    let ctx = Context::new();
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("a"));
    assert!(result.alternatives.is_empty());
}

#[test]
fn test_all_mode_ranks_alternatives_by_priority() {
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Low",
            "f1",
            10,
            Expr::variable("x"),
            Expr::variable("low"),
        ))
        .option(strategy(
            "High",
            "f2",
            20,
            Expr::variable("x"),
            Expr::variable("high"),
        ))
        .build();

    let ctx = Context::new(); // default mode explores everything
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("high"));
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.alternatives[0].strategy.name, "Low");
}

#[test]
fn test_first_mode_commits_to_the_first_success() {
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Low",
            "f1",
            10,
            Expr::variable("x"),
            Expr::variable("low"),
        ))
        .option(strategy(
            "High",
            "f2",
            20,
            Expr::variable("x"),
            Expr::variable("high"),
        ))
        .build();

    let ctx = Context::new().with_strategy_selection_mode(StrategySelectionMode::First);
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("low"));
    assert!(result.alternatives.is_empty());
}

#[test]
fn test_preferred_strategy_outranks_declared_priorities() {
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Low",
            "f1",
            10,
            Expr::variable("x"),
            Expr::variable("low"),
        ))
        .option(strategy(
            "High",
            "f2",
            20,
            Expr::variable("x"),
            Expr::variable("high"),
        ))
        .build();

    let ctx = Context::new()
        .with_strategy_selection_mode(StrategySelectionMode::HighestPriority)
        .with_preferred_strategy(CLASS, "Low");
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("low"));
}

#[test]
fn test_highest_priority_waits_for_an_outranking_strategy_still_in_play() {
    // Low succeeds immediately, but High is still in the pool and outranks
    // it, so the runner holds the result back. Once the supporting step has
    // advanced the main line, High fires and wins.
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Low",
            "f1",
            10,
            Expr::variable("x"),
            Expr::variable("low"),
        ))
        .option(strategy(
            "High",
            "f2",
            20,
            Expr::variable("y"),
            Expr::variable("high"),
        ))
        .apply(rewrite("Test.Advance", Expr::variable("x"), Expr::variable("y")).into_steps())
        .build();

    let ctx = Context::new().with_strategy_selection_mode(StrategySelectionMode::HighestPriority);
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("high"));
    // The winner's steps include the supporting advance.
    let steps = result.steps.as_ref().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].to_expr, Expr::variable("y"));
}

#[test]
fn test_fallback_fires_only_while_nothing_else_succeeded() {
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Main",
            "f1",
            10,
            Expr::variable("never matches"),
            Expr::variable("main"),
        ))
        .fallback(strategy(
            "LastResort",
            "f2",
            0,
            Expr::variable("x"),
            Expr::variable("fallback"),
        ))
        .build();

    let ctx = Context::new();
    let result = execute(&ctx, &runner, Expr::variable("x")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("fallback"));
}

#[test]
fn test_inapplicable_when_no_strategy_applies() {
    let runner = strategy_runner(CLASS)
        .option(strategy(
            "Main",
            "f1",
            10,
            Expr::variable("never matches"),
            Expr::variable("main"),
        ))
        .build();

    let ctx = Context::new();
    assert!(execute(&ctx, &runner, Expr::variable("x")).is_none());
}

#[test]
fn test_supporting_steps_are_shared_by_the_winning_strategy() {
    // A preparation step rewrites the input before any strategy fires; the
    // winning strategy's published steps include it.
    let runner = strategy_runner(CLASS)
        .apply(rewrite("Test.Prepare", Expr::variable("raw"), Expr::variable("x")).into_steps())
        .option(strategy(
            "Main",
            "f1",
            10,
            Expr::variable("x"),
            Expr::variable("solved"),
        ))
        .build();

    let ctx = Context::new();
    let result = execute(&ctx, &runner, Expr::variable("raw")).unwrap();
    assert_eq!(result.to_expr, Expr::variable("solved"));
    let steps = result.steps.as_ref().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].to_expr, Expr::variable("x"));
}
