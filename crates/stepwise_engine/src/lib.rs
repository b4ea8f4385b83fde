//! A combinator engine for explained, step-by-step expression rewriting.
//!
//! Methods map an expression to a transformation that records not just the
//! result but the full chain of steps leading to it, each step carrying a
//! translation-key explanation. Atomic rewrites are [`method::Rule`]s;
//! composite ones are assembled from the closed set of combinators in
//! [`producers`] via the builders in [`plan`], [`task_set`] and [`strategy`].
//!
//! Compiled method graphs are immutable and shared across request threads;
//! everything request-specific lives in a [`context::Context`].

pub mod context;
pub mod error;
pub mod metadata;
pub mod method;
pub mod partial;
pub mod pattern;
pub mod plan;
pub mod producers;
pub mod registry;
pub mod step;
pub mod strategy;
pub mod subexpression;
pub mod task_set;

pub use context::{Context, Setting, SettingValue, StrategySelectionMode};
pub use error::EngineError;
pub use metadata::{Metadata, MetadataKey, MetadataMaker};
pub use method::{ExecuteResult, Method, Rule, RuleResult};
pub use partial::{inline_partial_expressions, partial_sum_plan};
pub use pattern::{
    AnyPattern, CapturePattern, ChildExtractor, Extractor, FindExtractor, FixedPattern,
    KindPattern, Match, NaryOperator, NaryPattern, Pattern,
};
pub use plan::{plan, PlanBuilder};
pub use producers::{ProduceResult, StepsProducer, MAX_ITERATIONS};
pub use registry::{
    ListedMethod, MethodId, MethodRegistry, MethodRegistryBuilder, MethodRegistryEntry,
    StrategyRegistry,
};
pub use step::{Alternative, Tag, Task, Transformation, TransformationKind};
pub use strategy::{strategy_runner, Strategy, MAX_PRIORITY};
pub use subexpression::Subexpression;
pub use task_set::{task_set, TaskSetBuilder, TasksBuilder};
