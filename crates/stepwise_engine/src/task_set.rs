//! Task sets: methods explained by work on auxiliary expressions.
//!
//! Unlike a plan, whose steps all rewrite the input in place, a task set
//! explains itself through tasks on side expressions (isolate a part, work it
//! out, put the result back). Tasks run in declaration order; a failing task
//! abandons the current pattern match and backtracks to the next one.

use std::sync::Arc;

use stepwise_ast::Expr;

use crate::context::Context;
use crate::error::EngineError;
use crate::metadata::{keys, Metadata, MetadataKey, MetadataMaker};
use crate::method::{ExecuteResult, Method};
use crate::pattern::{AnyPattern, Match, NaryPattern, Pattern};
use crate::producers::StepsProducer;
use crate::step::{Task, Transformation};
use crate::subexpression::Subexpression;

/// Builds the task list for one pattern match.
///
/// `task` returning `Ok(None)` means the current match cannot be completed;
/// the closure should give up with `Ok(None)` so the task set can backtrack.
pub struct TasksBuilder<'a> {
    ctx: &'a Context,
    input: Subexpression,
    pattern_match: Match,
    tasks: Vec<Task>,
}

impl<'a> TasksBuilder<'a> {
    fn new(ctx: &'a Context, input: Subexpression, pattern_match: Match) -> Self {
        TasksBuilder {
            ctx,
            input,
            pattern_match,
            tasks: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &'a Context {
        self.ctx
    }

    /// The expression the task set is working on.
    pub fn input(&self) -> &Subexpression {
        &self.input
    }

    pub fn pattern_match(&self) -> &Match {
        &self.pattern_match
    }

    fn next_task_id(&self) -> String {
        format!("#{}", self.tasks.len() + 1)
    }

    fn push_task(
        &mut self,
        start_expr: Expr,
        explanation: Metadata,
        depends_on: &[&Task],
        steps: Vec<Transformation>,
    ) -> Task {
        let task = Task {
            task_id: self.next_task_id(),
            start_expr,
            explanation,
            steps,
            depends_on: depends_on.iter().map(|t| t.task_id.clone()).collect(),
        };
        self.tasks.push(task.clone());
        task
    }

    /// Add a task whose steps must apply. `Ok(None)` when they do not.
    pub fn task(
        &mut self,
        start_expr: Expr,
        explanation: Metadata,
        depends_on: &[&Task],
        steps: &StepsProducer,
    ) -> Result<Option<Task>, EngineError> {
        let Some(step_list) =
            steps.produce_steps(self.ctx, &Subexpression::root(start_expr.clone()))?
        else {
            return Ok(None);
        };
        Ok(Some(self.push_task(start_expr, explanation, depends_on, step_list)))
    }

    /// Add a task that keeps its start expression when the steps do not
    /// apply.
    pub fn task_with_optional_steps(
        &mut self,
        start_expr: Expr,
        explanation: Metadata,
        depends_on: &[&Task],
        steps: &StepsProducer,
    ) -> Result<Task, EngineError> {
        let step_list = steps
            .produce_steps(self.ctx, &Subexpression::root(start_expr.clone()))?
            .unwrap_or_default();
        Ok(self.push_task(start_expr, explanation, depends_on, step_list))
    }

    /// Add a stepless task, stating an expression without working on it.
    pub fn task_unchanged(
        &mut self,
        start_expr: Expr,
        explanation: Metadata,
        depends_on: &[&Task],
    ) -> Task {
        self.push_task(start_expr, explanation, depends_on, Vec::new())
    }

    fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

type TasksFn = dyn Fn(&mut TasksBuilder<'_>) -> Result<Option<()>, EngineError> + Send + Sync;

/// A method explained by tasks. The first pattern match whose tasks closure
/// completes with a non-empty task list wins; the result is the last task's
/// result.
pub struct TaskSet {
    pattern: Arc<dyn Pattern>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
    tasks: Arc<TasksFn>,
}

impl TaskSet {
    pub(crate) fn min_depth(&self) -> usize {
        self.pattern.min_depth()
    }

    pub(crate) fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        for m in self.pattern.find_matches(ctx, sub) {
            if let Some(tasks) = self.run_tasks(ctx, sub.clone(), m.clone())? {
                let to_expr = match tasks.last() {
                    Some(last) => last.to_expr(),
                    None => continue,
                };
                let explanation = self.explanation.make(ctx, sub, &m);
                let skills = self
                    .skill_makers
                    .iter()
                    .map(|maker| maker.make(ctx, sub, &m))
                    .collect();
                return Ok(Some(Transformation::task_set(
                    sub.clone(),
                    to_expr,
                    tasks,
                    Some(explanation),
                    skills,
                )));
            }
        }
        Ok(None)
    }

    fn run_tasks(
        &self,
        ctx: &Context,
        input: Subexpression,
        m: Match,
    ) -> Result<Option<Vec<Task>>, EngineError> {
        let mut builder = TasksBuilder::new(ctx, input, m);
        match (self.tasks)(&mut builder)? {
            None => Ok(None),
            Some(()) => {
                let tasks = builder.into_tasks();
                if tasks.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(tasks))
                }
            }
        }
    }
}

/// A task set working on a subset of an n-ary node's operands. The tasks see
/// the extracted partial expression; a final bookkeeping task substitutes
/// their result back into the parent.
pub struct PartialExpressionTaskSet {
    pattern: Arc<NaryPattern>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
    whole: TaskSet,
}

impl PartialExpressionTaskSet {
    pub(crate) fn min_depth(&self) -> usize {
        self.pattern.min_depth()
    }

    pub(crate) fn run(&self, ctx: &Context, sub: &Subexpression) -> ExecuteResult {
        for m in self.pattern.find_matches(ctx, sub) {
            if m.matched_children.len() == sub.expr.child_count() {
                if let Some(step) = self.whole.run(ctx, sub)? {
                    return Ok(Some(step));
                }
                continue;
            }

            let partial = self.pattern.extract(&sub.expr, &m);
            let Some(mut tasks) =
                self.whole
                    .run_tasks(ctx, Subexpression::root(partial), m.clone())?
            else {
                continue;
            };
            let (last_id, result) = match tasks.last() {
                Some(last) => (last.task_id.clone(), last.to_expr()),
                None => continue,
            };
            let to_expr = self.pattern.substitute(&sub.expr, &m, &result);
            tasks.push(Task {
                task_id: format!("#{}", tasks.len() + 1),
                start_expr: to_expr.clone(),
                explanation: Metadata::new(keys::SUBSTITUTE_RESULT_OF_TASK_SET),
                steps: Vec::new(),
                depends_on: vec![last_id],
            });
            let explanation = self.explanation.make(ctx, sub, &m);
            let skills = self
                .skill_makers
                .iter()
                .map(|maker| maker.make(ctx, sub, &m))
                .collect();
            return Ok(Some(Transformation::task_set(
                sub.clone(),
                to_expr,
                tasks,
                Some(explanation),
                skills,
            )));
        }
        Ok(None)
    }
}

/// Start building a task set with a fixed explanation key.
pub fn task_set(explanation: MetadataKey) -> TaskSetBuilder {
    TaskSetBuilder {
        pattern: Arc::new(AnyPattern),
        nary_pattern: None,
        explanation: MetadataMaker::FixedKey(explanation),
        skill_makers: Vec::new(),
    }
}

pub struct TaskSetBuilder {
    pattern: Arc<dyn Pattern>,
    nary_pattern: Option<Arc<NaryPattern>>,
    explanation: MetadataMaker,
    skill_makers: Vec<MetadataMaker>,
}

impl TaskSetBuilder {
    pub fn pattern(mut self, pattern: Arc<dyn Pattern>) -> Self {
        self.pattern = pattern;
        self
    }

    /// Required before [`TaskSetBuilder::partial_expression_tasks`].
    pub fn nary_pattern(mut self, pattern: NaryPattern) -> Self {
        let pattern = Arc::new(pattern);
        self.pattern = pattern.clone();
        self.nary_pattern = Some(pattern);
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

    pub fn tasks<F>(self, tasks: F) -> Method
    where
        F: Fn(&mut TasksBuilder<'_>) -> Result<Option<()>, EngineError> + Send + Sync + 'static,
    {
        Method::TaskSet(TaskSet {
            pattern: self.pattern,
            explanation: self.explanation,
            skill_makers: self.skill_makers,
            tasks: Arc::new(tasks),
        })
    }

    /// Finish as a partial expression task set. Panics unless an n-ary
    /// pattern was set.
    pub fn partial_expression_tasks<F>(self, tasks: F) -> Method
    where
        F: Fn(&mut TasksBuilder<'_>) -> Result<Option<()>, EngineError> + Send + Sync + 'static,
    {
        let nary = self
            .nary_pattern
            .clone()
            .unwrap_or_else(|| panic!("a partial expression task set needs an n-ary pattern"));
        Method::PartialExpressionTaskSet(PartialExpressionTaskSet {
            pattern: nary,
            explanation: self.explanation.clone(),
            skill_makers: self.skill_makers.clone(),
            whole: TaskSet {
                pattern: self.pattern,
                explanation: self.explanation,
                skill_makers: self.skill_makers,
                tasks: Arc::new(tasks),
            },
        })
    }
}
