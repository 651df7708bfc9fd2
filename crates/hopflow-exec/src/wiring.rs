//! Build step: graph metadata → units, queues and the shared run control.
//!
//! Queues are created per hop with `hopflow_planner::copy_pairs`; each queue
//! has exactly one producer unit and one consumer unit.

use std::sync::Arc;
use std::time::Duration;

use hopflow_core::config::EngineConfig;
use hopflow_core::graph::GraphMeta;
use hopflow_core::id::{QueueId, UnitId};
use hopflow_core::partition::HashPartitioner;
use hopflow_core::step::{StepContext, StepFactory};
use hopflow_core::variables::VariableSpace;
use hopflow_planner::copy_pairs;

use crate::control::RunControl;
use crate::queue::{QueueEnds, RowQueue};
use crate::result::StepCounters;
use crate::route::{ErrorOutput, OutputRouter, TargetQueues};
use crate::runtime::ExecError;
use crate::unit::{StepUnit, UnitIo};

#[derive(Default)]
struct Slot {
    inputs: Vec<Arc<RowQueue>>,
    targets: Vec<TargetQueues>,
    error: Option<TargetQueues>,
}

pub struct Wiring {
    pub units: Vec<StepUnit>,
    pub control: Arc<RunControl>,
}

/// Create every unit of `graph` in step order, then copy order. Assumes the
/// graph already passed validation.
pub fn build_units(
    graph: &GraphMeta,
    config: &EngineConfig,
    factory: &dyn StepFactory,
) -> Result<Wiring, ExecError> {
    let mut slots: Vec<Vec<Slot>> = graph
        .steps
        .iter()
        .map(|s| (0..s.copies).map(|_| Slot::default()).collect())
        .collect();
    let mut queues = Vec::new();

    for hop in graph.hops.iter().filter(|h| h.enabled) {
        let from_idx = graph
            .step_index(&hop.from)
            .ok_or_else(|| ExecError::UnknownStep(hop.from.clone()))?;
        let to_idx = graph
            .step_index(&hop.to)
            .ok_or_else(|| ExecError::UnknownStep(hop.to.clone()))?;
        let (from, to) = (&graph.steps[from_idx], &graph.steps[to_idx]);

        let partitioner = match &to.partitioning {
            Some(spec) if to.copies > 1 => Some(
                HashPartitioner::from_spec(spec)
                    .map_err(|e| ExecError::build(&to.name, 0, e.to_string()))?,
            ),
            _ => None,
        };

        let mut per_copy: Vec<Vec<Arc<RowQueue>>> = vec![Vec::new(); from.copies];
        for (i, j) in copy_pairs(from.copies, to.copies, to.partitioning.is_some()) {
            let q = Arc::new(RowQueue::new(
                QueueId::new(queues.len() as u64),
                QueueEnds {
                    from_step: from.name.clone(),
                    from_copy: i,
                    to_step: to.name.clone(),
                    to_copy: j,
                },
                config.queue_capacity,
            ));
            slots[to_idx][j].inputs.push(Arc::clone(&q));
            per_copy[i].push(Arc::clone(&q));
            queues.push(q);
        }

        for (i, qs) in per_copy.into_iter().enumerate() {
            let tq = TargetQueues::new(to.name.clone(), qs, partitioner.clone(), i);
            let slot = &mut slots[from_idx][i];
            if hop.error {
                slot.error = Some(tq);
            } else {
                slot.targets.push(tq);
            }
        }
    }

    tracing::debug!(queues = queues.len(), "queues wired");
    let control = Arc::new(RunControl::new(queues));
    let variables: Arc<VariableSpace> = Arc::new(config.variables.iter().cloned().collect());
    let messages = Arc::new(factory.messages());
    let poll = Duration::from_millis(config.input_poll_ms.max(1));

    let mut units = Vec::new();
    for (step, step_slots) in graph.steps.iter().zip(slots) {
        for (copy, slot) in step_slots.into_iter().enumerate() {
            let logic = factory
                .create(step, copy)
                .map_err(|e| ExecError::build(&step.name, copy, e.to_string()))?;
            let ctx = StepContext {
                step_name: step.name.clone(),
                copy,
                copies: step.copies,
                variables: Arc::clone(&variables),
                messages: Arc::clone(&messages),
            };
            let io = UnitIo::new(
                slot.inputs,
                OutputRouter::new(slot.targets, step.distribute, config.safe_mode),
                Arc::new(StepCounters::default()),
                Arc::clone(&control),
                poll,
            );
            let error_output = slot.error.map(|tq| {
                ErrorOutput::new(
                    tq,
                    step.error_handling.clone().unwrap_or_default(),
                    config.safe_mode,
                )
            });
            units.push(StepUnit::new(
                UnitId::new(units.len() as u64),
                ctx,
                logic,
                io,
                error_output,
            ));
        }
    }

    Ok(Wiring { units, control })
}
