//! Dispatch on a context setting value.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{ProduceResult, StepsProducer};
use crate::context::{Context, Setting, SettingValue};
use crate::subexpression::Subexpression;

type ProducerInit = Arc<dyn Fn() -> StepsProducer + Send + Sync>;

pub struct BranchCase {
    value: SettingValue,
    init: ProducerInit,
    compiled: OnceCell<Arc<StepsProducer>>,
}

impl BranchCase {
    fn producer(&self) -> &Arc<StepsProducer> {
        // Races at most waste a duplicate construction; the cell keeps one.
        self.compiled.get_or_init(|| Arc::new((self.init)()))
    }
}

/// Runs the case whose value equals the setting's value in the current
/// context. The selected case's outcome is final: an inapplicable case does
/// not fall through to other cases. Case bodies are built on first use so a
/// branch can close a recursive plan graph.
pub struct BranchOn {
    setting: Setting,
    cases: Vec<BranchCase>,
}

impl BranchOn {
    /// Panics on an empty case list or a duplicate case value; both are
    /// construction mistakes.
    pub(crate) fn new(setting: Setting, cases: Vec<(SettingValue, ProducerInit)>) -> Self {
        assert!(!cases.is_empty(), "branchOn needs at least one case");
        let mut seen = Vec::new();
        for (value, _) in &cases {
            assert!(
                !seen.contains(value),
                "branchOn has two cases for the same value"
            );
            seen.push(*value);
        }
        BranchOn {
            setting,
            cases: cases
                .into_iter()
                .map(|(value, init)| BranchCase {
                    value,
                    init,
                    compiled: OnceCell::new(),
                })
                .collect(),
        }
    }

    pub fn min_depth(&self) -> usize {
        self.cases
            .iter()
            .map(|case| case.producer().min_depth())
            .min()
            .unwrap_or(1)
    }

    pub fn produce_steps(&self, ctx: &Context, sub: &Subexpression) -> ProduceResult {
        let value = ctx.get(self.setting);
        for case in &self.cases {
            if case.value == value {
                return case.producer().produce_steps(ctx, sub);
            }
        }
        Ok(None)
    }
}

/// Fluent constructor for [`BranchOn`].
pub struct BranchOnBuilder {
    setting: Setting,
    cases: Vec<(SettingValue, ProducerInit)>,
}

impl BranchOnBuilder {
    pub(crate) fn new(setting: Setting) -> Self {
        BranchOnBuilder {
            setting,
            cases: Vec::new(),
        }
    }

    pub fn case<F>(mut self, value: SettingValue, init: F) -> Self
    where
        F: Fn() -> StepsProducer + Send + Sync + 'static,
    {
        self.cases.push((value, Arc::new(init)));
        self
    }

    pub fn build(self) -> StepsProducer {
        StepsProducer::BranchOn(BranchOn::new(self.setting, self.cases))
    }
}
