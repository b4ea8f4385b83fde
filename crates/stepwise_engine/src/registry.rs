//! The public catalogue of methods.
//!
//! Embedders look methods up by their string id ("Category.Name") and probe
//! the whole catalogue against an input. The registry is immutable once
//! built, so it is safe to share across request threads.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use stepwise_ast::Expr;

use crate::context::Context;
use crate::error::EngineError;
use crate::method::Method;
use crate::step::Transformation;
use crate::strategy::Strategy;
use crate::subexpression::Subexpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MethodId {
    pub category: &'static str,
    pub name: &'static str,
}

impl MethodId {
    pub const fn new(category: &'static str, name: &'static str) -> Self {
        MethodId { category, name }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

pub struct MethodRegistryEntry {
    pub method_id: MethodId,
    pub description: &'static str,
    /// Registered but kept out of listings (internal or experimental).
    pub hidden_from_list: bool,
    /// Ids of registered methods that are more specific versions of this
    /// one. When one of them succeeds on an input, this method is skipped
    /// when probing the catalogue.
    pub more_specific: Vec<MethodId>,
    pub implementation: Arc<Method>,
}

/// Listing DTO handed to embedders.
#[derive(Debug, Clone, Serialize)]
pub struct ListedMethod {
    pub method_id: String,
    pub description: &'static str,
}

#[derive(Default)]
pub struct MethodRegistryBuilder {
    entries: Vec<MethodRegistryEntry>,
}

impl MethodRegistryBuilder {
    pub fn new() -> Self {
        MethodRegistryBuilder::default()
    }

    /// Panics on a duplicate method id; two registrations under one id are
    /// always a construction mistake.
    pub fn register(&mut self, entry: MethodRegistryEntry) {
        assert!(
            !self.entries.iter().any(|e| e.method_id == entry.method_id),
            "method {} registered twice",
            entry.method_id
        );
        self.entries.push(entry);
    }

    /// Build the registry, ordering entries so that more specific methods
    /// come before the methods they specialize. Panics on a cycle in the
    /// more-specific relation.
    pub fn build(self) -> MethodRegistry {
        let mut remaining = self.entries;
        let mut sorted: Vec<MethodRegistryEntry> = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let placed: Vec<MethodId> = sorted.iter().map(|e| e.method_id).collect();
            let position = remaining.iter().position(|entry| {
                entry
                    .more_specific
                    .iter()
                    .all(|id| placed.contains(id) || !remaining.iter().any(|e| e.method_id == *id))
            });
            match position {
                Some(index) => sorted.push(remaining.swap_remove(index)),
                None => panic!("cycle in the more-specific method relation"),
            }
        }
        let by_id = sorted
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.method_id, index))
            .collect();
        MethodRegistry {
            entries: sorted,
            by_id,
        }
    }
}

pub struct MethodRegistry {
    /// Sorted so more specific methods come first.
    entries: Vec<MethodRegistryEntry>,
    by_id: FxHashMap<MethodId, usize>,
}

impl MethodRegistry {
    pub fn entries(&self) -> &[MethodRegistryEntry] {
        &self.entries
    }

    pub fn get_method(&self, method_id: MethodId) -> Option<&Arc<Method>> {
        self.by_id
            .get(&method_id)
            .map(|&index| &self.entries[index].implementation)
    }

    /// Find a method by the string form of its id.
    pub fn get_method_by_name(&self, name: &str) -> Option<&Arc<Method>> {
        let (category, method_name) = name.split_once('.')?;
        self.entries
            .iter()
            .find(|entry| {
                entry.method_id.category == category && entry.method_id.name == method_name
            })
            .map(|entry| &entry.implementation)
    }

    pub fn method_is_listed(&self, method_id: MethodId) -> bool {
        self.by_id
            .get(&method_id)
            .map(|&index| !self.entries[index].hidden_from_list)
            .unwrap_or(false)
    }

    /// Listing of all non-hidden methods, in specificity order.
    pub fn listed_methods(&self) -> Vec<ListedMethod> {
        self.entries
            .iter()
            .filter(|entry| !entry.hidden_from_list)
            .map(|entry| ListedMethod {
                method_id: entry.method_id.to_string(),
                description: entry.description,
            })
            .collect()
    }

    /// Probe every registered method against `expr`, in specificity order.
    ///
    /// A method is skipped when a more specific method already succeeded.
    /// Runaway methods are logged and skipped so one bad method cannot take
    /// down the whole probe; an interrupt stops everything.
    pub fn select_successful_methods(
        &self,
        ctx: &Context,
        expr: &Expr,
    ) -> Result<Vec<(MethodId, Transformation)>, EngineError> {
        let mut succeeded: Vec<MethodId> = Vec::new();
        let mut selections = Vec::new();
        for entry in &self.entries {
            if entry.more_specific.iter().any(|id| succeeded.contains(id)) {
                tracing::debug!(method = %entry.method_id, "skipped, more specific method succeeded");
                succeeded.push(entry.method_id);
                continue;
            }
            let input = Subexpression::root(expr.clone());
            match entry.implementation.try_execute(ctx, &input) {
                Ok(Some(transformation)) => {
                    tracing::debug!(method = %entry.method_id, "success");
                    succeeded.push(entry.method_id);
                    selections.push((entry.method_id, transformation));
                }
                Ok(None) => {
                    tracing::debug!(method = %entry.method_id, "failure");
                }
                Err(EngineError::Interrupted) => return Err(EngineError::Interrupted),
                Err(error) => {
                    tracing::error!(method = %entry.method_id, %error, "method failed, skipping");
                }
            }
        }
        Ok(selections)
    }
}

/// Rosters of strategies by strategy class, for embedders that list the
/// strategies a request may prefer or select between.
#[derive(Default)]
pub struct StrategyRegistry {
    rosters: FxHashMap<&'static str, Vec<Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry::default()
    }

    /// Panics when a class is registered twice.
    pub fn register_roster(&mut self, strategy_class: &'static str, strategies: Vec<Strategy>) {
        let previous = self.rosters.insert(strategy_class, strategies);
        assert!(
            previous.is_none(),
            "strategy class {} registered twice",
            strategy_class
        );
    }

    pub fn strategies_for(&self, strategy_class: &str) -> &[Strategy] {
        self.rosters
            .get(strategy_class)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rosters.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use crate::method::{Rule, RuleResult};
    use crate::pattern::FixedPattern;

    fn rule_entry(
        method_id: MethodId,
        from: Expr,
        to: Expr,
        more_specific: Vec<MethodId>,
    ) -> MethodRegistryEntry {
        MethodRegistryEntry {
            method_id,
            description: "test entry",
            hidden_from_list: false,
            more_specific,
            implementation: Arc::new(
                Rule::new(method_id.name, Arc::new(FixedPattern::new(from)), move |_, _, _| {
                    Some(RuleResult::new(to.clone(), Some(Metadata::new("Test.Rule"))))
                })
                .into_method(),
            ),
        }
    }

    const GENERAL: MethodId = MethodId::new("Test", "General");
    const SPECIFIC: MethodId = MethodId::new("Test", "Specific");

    fn registry() -> MethodRegistry {
        let mut builder = MethodRegistryBuilder::new();
        builder.register(rule_entry(
            GENERAL,
            Expr::integer(0),
            Expr::variable("general"),
            vec![SPECIFIC],
        ));
        builder.register(rule_entry(
            SPECIFIC,
            Expr::integer(0),
            Expr::variable("specific"),
            vec![],
        ));
        builder.build()
    }

    #[test]
    fn test_more_specific_methods_come_first() {
        let registry = registry();
        let ids: Vec<MethodId> = registry.entries().iter().map(|e| e.method_id).collect();
        assert_eq!(ids, vec![SPECIFIC, GENERAL]);
    }

    #[test]
    fn test_lookup_by_string_id() {
        let registry = registry();
        assert!(registry.get_method_by_name("Test.Specific").is_some());
        assert!(registry.get_method_by_name("Test.Missing").is_none());
        assert!(registry.get_method_by_name("Nonsense").is_none());
    }

    #[test]
    fn test_strategy_rosters_are_looked_up_by_class() {
        let isolate = Rule::new(
            "Isolate",
            Arc::new(FixedPattern::new(Expr::integer(0))),
            |_, _, _| {
                Some(RuleResult::new(
                    Expr::integer(1),
                    Some(Metadata::new("Test.Isolate")),
                ))
            },
        )
        .into_method();
        let solve = Strategy::new(
            "EquationSolving",
            "Isolate",
            "direct",
            10,
            "Test.Isolate",
            isolate.into_steps(),
        );
        let mut registry = StrategyRegistry::new();
        registry.register_roster("EquationSolving", vec![solve]);

        assert_eq!(registry.strategies_for("EquationSolving").len(), 1);
        assert_eq!(registry.strategies_for("EquationSolving")[0].name, "Isolate");
        assert!(registry.strategies_for("InequalitySolving").is_empty());
    }

    #[test]
    fn test_probe_skips_generalizations_of_successes() {
        let registry = registry();
        let ctx = Context::new();
        let selections = registry
            .select_successful_methods(&ctx, &Expr::integer(0))
            .unwrap();
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].0, SPECIFIC);
    }
}
