//! Wires the ECS compiler, Operator Runner, and Step Driver together
//! around one compiled configuration.

use crate::error::SimulationError;
use sse_compiler::{compile, extract_variable_defaults, ConfigDocument};
use sse_core::{HistoryStep, State};
use sse_driver::{CancellationToken, StepDriver};
use sse_eval::FunctionRegistry;
use sse_history::HistoryStore;
use sse_runner::Runner;
use sse_sampler::Sampler;
use std::rc::Rc;

/// A compiled configuration driven one step at a time.
///
/// Owns the [`StepDriver`] produced by compiling `doc` and wiring a
/// [`Runner`] around `sampler`. The first operator is whichever operator
/// the compiler places first in render order (the first template of the
/// first entity/variable pair that declares a system).
pub struct Simulation {
    driver: StepDriver,
}

impl Simulation {
    /// Compile `doc` and build a driver ready to run from its first
    /// operator.
    pub fn compile(
        doc: &ConfigDocument,
        world_entity_name: &str,
        task_name: &str,
        sampler: Rc<dyn Sampler>,
        model: impl Into<String>,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let registry = FunctionRegistry::with_seed_set();
        let defaults = extract_variable_defaults(doc);
        let (operators, state) = compile(doc, world_entity_name, task_name, &registry, &defaults)?;
        let first_id = operators.first().ok_or(SimulationError::EmptyProgram)?.id.clone();
        let runner = Runner::new(sampler, registry.clone(), seed, model);
        let driver = StepDriver::new(operators, state, runner, registry, first_id)?;
        Ok(Self { driver })
    }

    /// Run one step of the simulation.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Result<&HistoryStep, SimulationError> {
        self.driver.step(cancel).await.map_err(SimulationError::from)
    }

    /// The live, mutable world state.
    pub fn state(&self) -> &State {
        self.driver.state()
    }

    /// The history accumulated so far.
    pub fn history(&self) -> &HistoryStore {
        self.driver.history()
    }

    /// The operator id the next call to [`Self::step`] will run.
    pub fn current_operator_id(&self) -> &str {
        self.driver.current_operator_id()
    }
}
