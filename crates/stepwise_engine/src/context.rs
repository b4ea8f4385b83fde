//! Per-request evaluation context.
//!
//! A `Context` carries everything that varies between requests while the
//! compiled method graph itself stays shared and immutable: setting values,
//! strategy preferences, the embedder's cancellation hook and a small cache of
//! subexpressions a given producer already failed on.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use stepwise_ast::Expr;

use crate::error::EngineError;

/// A context setting: a name plus the value used when a request does not set
/// it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Setting {
    pub name: &'static str,
    pub default: SettingValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingValue {
    Boolean(bool),
    Name(&'static str),
}

/// How a strategy runner arbitrates between the alternatives found in a
/// round. See [`crate::strategy::StrategyRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategySelectionMode {
    /// Explore every applicable strategy and keep all results.
    #[default]
    All,
    /// Keep only the best-ranked alternative.
    HighestPriority,
    /// Commit to the first alternative found.
    First,
}

/// Opaque descriptor attached to a selectable resource (a curriculum tag, a
/// region, anything the embedder keys selection on).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceData {
    pub tags: Vec<&'static str>,
}

impl ResourceData {
    pub fn new(tags: Vec<&'static str>) -> Self {
        ResourceData { tags }
    }
}

/// Something a [`ResourceSelector`] can choose between.
pub trait Resource {
    fn resource_data(&self) -> &ResourceData;
}

/// Embedder-provided policy for picking between context-sensitive
/// alternatives. Returning `None` keeps the default.
pub trait ResourceSelector: Send + Sync {
    fn select_index(&self, default: &ResourceData, alternatives: &[&ResourceData]) -> Option<usize>;
}

pub type ActiveCheck = Arc<dyn Fn() -> bool + Send + Sync>;

type FailureCache = RefCell<FxHashMap<(usize, Expr), bool>>;

/// The per-request context threaded through every method execution.
pub struct Context {
    settings: FxHashMap<&'static str, SettingValue>,
    pub strategy_selection_mode: StrategySelectionMode,
    preferred_strategies: FxHashMap<&'static str, &'static str>,
    resource_selector: Option<Arc<dyn ResourceSelector>>,
    active_check: Option<ActiveCheck>,
    failure_cache: FailureCache,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            settings: FxHashMap::default(),
            strategy_selection_mode: StrategySelectionMode::default(),
            preferred_strategies: FxHashMap::default(),
            resource_selector: None,
            active_check: None,
            failure_cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn with_setting(mut self, setting: Setting, value: SettingValue) -> Self {
        self.settings.insert(setting.name, value);
        self
    }

    pub fn with_strategy_selection_mode(mut self, mode: StrategySelectionMode) -> Self {
        self.strategy_selection_mode = mode;
        self
    }

    /// Prefer the strategy called `strategy` whenever a runner for
    /// `strategy_class` arbitrates.
    pub fn with_preferred_strategy(
        mut self,
        strategy_class: &'static str,
        strategy: &'static str,
    ) -> Self {
        self.preferred_strategies.insert(strategy_class, strategy);
        self
    }

    pub fn with_resource_selector(mut self, selector: Arc<dyn ResourceSelector>) -> Self {
        self.resource_selector = Some(selector);
        self
    }

    pub fn with_active_check(mut self, check: ActiveCheck) -> Self {
        self.active_check = Some(check);
        self
    }

    /// The value of `setting` for this request, falling back to its default.
    pub fn get(&self, setting: Setting) -> SettingValue {
        self.settings
            .get(setting.name)
            .copied()
            .unwrap_or(setting.default)
    }

    /// Shorthand for boolean settings.
    pub fn is_set(&self, setting: Setting) -> bool {
        self.get(setting) == SettingValue::Boolean(true)
    }

    pub fn preferred_strategy(&self, strategy_class: &'static str) -> Option<&'static str> {
        self.preferred_strategies.get(strategy_class).copied()
    }

    /// Fail with [`EngineError::Interrupted`] if the embedder's cancellation
    /// check says this computation should stop. Called at every method entry.
    pub fn require_active(&self) -> Result<(), EngineError> {
        match &self.active_check {
            Some(check) if !check() => Err(EngineError::Interrupted),
            _ => Ok(()),
        }
    }

    /// Resolve a context-sensitive choice. Without a selector, or when the
    /// selector abstains or returns an out-of-range index, the default wins.
    pub fn select_best_resource<'a, R: Resource>(
        &self,
        default: &'a R,
        alternatives: &'a [R],
    ) -> &'a R {
        let Some(selector) = &self.resource_selector else {
            return default;
        };
        let datas: Vec<&ResourceData> =
            alternatives.iter().map(|a| a.resource_data()).collect();
        match selector.select_index(default.resource_data(), &datas) {
            Some(index) => alternatives.get(index).unwrap_or(default),
            None => default,
        }
    }

    /// Run `f` unless this (producer, expression) pair already failed in this
    /// request. Producers that search the same subtree repeatedly (deep
    /// visitors, plans re-entered via strategy rounds) use this to skip known
    /// dead ends. Errors are not cached.
    pub(crate) fn unless_previously_failed<T>(
        &self,
        producer_key: usize,
        expr: &Expr,
        f: impl FnOnce() -> Result<Option<T>, EngineError>,
    ) -> Result<Option<T>, EngineError> {
        let key = (producer_key, expr.clone());
        if let Some(false) = self.failure_cache.borrow().get(&key) {
            tracing::trace!(expression = %expr, "skipping known failure");
            return Ok(None);
        }
        let result = f()?;
        self.failure_cache
            .borrow_mut()
            .insert(key, result.is_some());
        Ok(result)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("strategy_selection_mode", &self.strategy_selection_mode)
            .field("preferred_strategies", &self.preferred_strategies)
            .finish_non_exhaustive()
    }
}
