//! Strategies and their arbitration.
//!
//! A strategy is a named, prioritized way of attacking one kind of problem.
//! A strategy runner tries its strategies in rounds, interleaved with
//! supporting steps, records the outcomes as alternatives, and arbitrates
//! between them according to the context's selection mode.

use std::fmt;
use std::sync::Arc;

use crate::context::{Context, StrategySelectionMode};
use crate::error::EngineError;
use crate::metadata::{Metadata, MetadataKey};
use crate::method::{ExecuteResult, Method};
use crate::producers::{StepsBuilder, StepsProducer, MAX_ITERATIONS};
use crate::step::{Alternative, Transformation, TransformationKind};
use crate::subexpression::Subexpression;

/// Priority of a strategy the context explicitly prefers; outranks every
/// declared priority.
pub const MAX_PRIORITY: i32 = i32::MAX;

#[derive(Clone)]
pub struct Strategy {
    /// The strategy class this belongs to (one class per runner).
    pub class: &'static str,
    pub name: &'static str,
    /// Strategies sharing a family are variations of one idea; applying one
    /// rules out the others.
    pub family: &'static str,
    pub priority: i32,
    pub explanation: MetadataKey,
    pub steps: Arc<StepsProducer>,
}

impl Strategy {
    pub fn new(
        class: &'static str,
        name: &'static str,
        family: &'static str,
        priority: i32,
        explanation: MetadataKey,
        steps: StepsProducer,
    ) -> Self {
        Strategy {
            class,
            name,
            family,
            priority,
            explanation,
            steps: Arc::new(steps),
        }
    }

    fn key(&self) -> (&'static str, &'static str) {
        (self.class, self.name)
    }

    pub fn is_incompatible_with(&self, other: &Strategy) -> bool {
        self.family == other.family
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("class", &self.class)
            .field("name", &self.name)
            .field("family", &self.family)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

pub enum StrategyOption {
    /// Try a strategy; success records an alternative without advancing the
    /// main line.
    Try(Strategy),
    /// Supporting steps applied to the main line itself, shared by whatever
    /// strategy eventually wins.
    Apply(Arc<StepsProducer>),
    /// Tried only while no strategy has succeeded yet.
    Fallback(Strategy),
}

/// Runs strategies in rounds until arbitration picks a result.
///
/// Each round walks the options in order and stops at the first success.
/// A tried strategy leaves the round's pool along with its whole family.
/// When no option fires and no alternative was ever recorded, the runner is
/// inapplicable.
pub struct StrategyRunner {
    class: &'static str,
    options: Vec<StrategyOption>,
}

impl StrategyRunner {
    pub(crate) fn min_depth(&self) -> usize {
        self.options
            .iter()
            .map(|option| match option {
                StrategyOption::Try(s) | StrategyOption::Fallback(s) => s.steps.min_depth(),
                StrategyOption::Apply(p) => p.min_depth(),
            })
            .min()
            .unwrap_or(1)
    }

    fn effective_priority(&self, ctx: &Context, strategy: &Strategy) -> i32 {
        if ctx.preferred_strategy(self.class) == Some(strategy.name) {
            MAX_PRIORITY
        } else {
            strategy.priority
        }
    }

    pub(crate) fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        let mut builder = StepsBuilder::new(ctx, sub.clone());
        let mut pool: Vec<Strategy> = self
            .options
            .iter()
            .filter_map(|option| match option {
                StrategyOption::Try(s) | StrategyOption::Fallback(s) => Some(s.clone()),
                StrategyOption::Apply(_) => None,
            })
            .collect();
        let mut alternatives: Vec<Alternative> = Vec::new();

        for _ in 0..MAX_ITERATIONS {
            let mut round_succeeded = false;
            for option in &self.options {
                if round_succeeded {
                    break;
                }
                match option {
                    StrategyOption::Try(strategy) => {
                        self.try_strategy(
                            ctx,
                            strategy,
                            &builder,
                            &mut pool,
                            &mut alternatives,
                            &mut round_succeeded,
                        )?;
                    }
                    StrategyOption::Fallback(strategy) => {
                        if alternatives.is_empty() {
                            self.try_strategy(
                                ctx,
                                strategy,
                                &builder,
                                &mut pool,
                                &mut alternatives,
                                &mut round_succeeded,
                            )?;
                        }
                    }
                    StrategyOption::Apply(producer) => {
                        if let Some(steps) = producer.produce_steps(ctx, &builder.expression())? {
                            builder.add_steps(steps);
                            round_succeeded = true;
                        }
                    }
                }
            }

            if !round_succeeded && alternatives.is_empty() {
                return Ok(None);
            }
            if alternatives.is_empty() {
                continue;
            }

            match ctx.strategy_selection_mode {
                StrategySelectionMode::First => {
                    return Ok(Some(self.make_transformation(vec![alternatives[0].clone()])));
                }
                StrategySelectionMode::HighestPriority => {
                    let best = alternatives
                        .iter()
                        .enumerate()
                        .max_by_key(|(_, a)| self.effective_priority(ctx, &a.strategy))
                        .map(|(i, _)| i);
                    if let Some(best) = best {
                        let best_priority =
                            self.effective_priority(ctx, &alternatives[best].strategy);
                        let outranked = pool
                            .iter()
                            .any(|s| self.effective_priority(ctx, s) > best_priority);
                        if !round_succeeded || !outranked {
                            return Ok(Some(
                                self.make_transformation(vec![alternatives[best].clone()]),
                            ));
                        }
                    }
                }
                StrategySelectionMode::All => {
                    if !round_succeeded || pool.is_empty() {
                        let mut ordered = alternatives.clone();
                        ordered.sort_by_key(|a| {
                            std::cmp::Reverse(self.effective_priority(ctx, &a.strategy))
                        });
                        return Ok(Some(self.make_transformation(ordered)));
                    }
                }
            }
        }
        Err(EngineError::TooManyIterations {
            limit: MAX_ITERATIONS,
            expression: builder.expression().expr.to_string(),
        })
    }

    fn try_strategy(
        &self,
        ctx: &Context,
        strategy: &Strategy,
        builder: &StepsBuilder<'_>,
        pool: &mut Vec<Strategy>,
        alternatives: &mut Vec<Alternative>,
        round_succeeded: &mut bool,
    ) -> Result<(), EngineError> {
        if !pool.iter().any(|s| s.key() == strategy.key()) {
            return Ok(());
        }
        if let Some(steps) = strategy.steps.produce_steps(ctx, &builder.expression())? {
            let mut branch = builder.branch();
            branch.add_steps(steps);
            let alternative_steps = branch.into_steps();
            if !alternative_steps.is_empty() {
                alternatives.push(Alternative {
                    strategy: strategy.clone(),
                    steps: alternative_steps,
                });
                pool.retain(|s| {
                    s.key() != strategy.key() && !s.is_incompatible_with(strategy)
                });
                *round_succeeded = true;
            }
        }
        Ok(())
    }

    /// Publish the top-ranked alternative as the main transformation, with
    /// the rest attached as runner-up alternatives.
    fn make_transformation(&self, ordered: Vec<Alternative>) -> Transformation {
        let mut ordered = ordered;
        let main = ordered.remove(0);
        let secondary = ordered;

        // A strategy whose steps already published themselves under the
        // strategy's own explanation needs no extra wrapping.
        if main.steps.len() == 1 {
            let step = &main.steps[0];
            if step.explanation.as_ref().map(|m| m.key) == Some(main.strategy.explanation) {
                let mut step = step.clone();
                step.alternatives = secondary;
                return step;
            }
        }

        let from_expr = match main.steps.first() {
            Some(first) => first.from_expr.clone(),
            None => unreachable!("alternatives always carry steps"),
        };
        let to_expr = match main.steps.last() {
            Some(last) => last.to_expr.clone(),
            None => unreachable!("alternatives always carry steps"),
        };
        Transformation {
            kind: TransformationKind::Plan,
            from_expr,
            to_expr,
            steps: Some(main.steps),
            tasks: None,
            explanation: Some(Metadata::new(main.strategy.explanation)),
            skills: Vec::new(),
            tags: Vec::new(),
            alternatives: secondary,
        }
    }
}

/// Start building a strategy runner for one strategy class.
pub fn strategy_runner(class: &'static str) -> StrategyRunnerBuilder {
    StrategyRunnerBuilder {
        class,
        options: Vec::new(),
    }
}

pub struct StrategyRunnerBuilder {
    class: &'static str,
    options: Vec<StrategyOption>,
}

impl StrategyRunnerBuilder {
    pub fn option(mut self, strategy: Strategy) -> Self {
        self.options.push(StrategyOption::Try(strategy));
        self
    }

    /// Supporting steps run on the main line between strategy attempts.
    pub fn apply(mut self, producer: StepsProducer) -> Self {
        self.options.push(StrategyOption::Apply(Arc::new(producer)));
        self
    }

    pub fn fallback(mut self, strategy: Strategy) -> Self {
        self.options.push(StrategyOption::Fallback(strategy));
        self
    }

    /// Panics if no options were added.
    pub fn build(self) -> Method {
        assert!(
            !self.options.is_empty(),
            "a strategy runner needs at least one option"
        );
        Method::StrategyRunner(StrategyRunner {
            class: self.class,
            options: self.options,
        })
    }
}
