//! Physical layout: the units and queues an executor run will build.
//!
//! The executor wires queues with `copy_pairs`, so what `explain` prints is
//! exactly what runs.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use hopflow_core::graph::GraphMeta;

use crate::error::PlanError;
use crate::rules::validate_graph;

/// Copy pairs `(from_copy, to_copy)` that get a queue for a hop between a
/// step with `from_copies` copies and one with `to_copies`.
///
/// Equal copy counts without key partitioning pair copies 1:1; everything
/// else (1→N, N→1, N→M, partitioned targets) is a full mesh.
pub fn copy_pairs(from_copies: usize, to_copies: usize, partitioned: bool) -> Vec<(usize, usize)> {
    if from_copies == to_copies && !partitioned {
        return (0..from_copies).map(|i| (i, i)).collect();
    }
    (0..from_copies)
        .flat_map(|i| (0..to_copies).map(move |j| (i, j)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlan {
    pub step: String,
    pub step_type: String,
    pub copies: usize,
    pub distribute: bool,
    pub partition_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePlan {
    pub from: String,
    pub from_copy: usize,
    pub to: String,
    pub to_copy: usize,
    pub error: bool,
}

impl QueuePlan {
    /// `from.i - to.j`, the name the queue carries at run time.
    pub fn name(&self) -> String {
        format!("{}.{} - {}.{}", self.from, self.from_copy, self.to, self.to_copy)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalLayout {
    /// Steps in topological order.
    pub units: Vec<UnitPlan>,
    /// Queues in hop declaration order.
    pub queues: Vec<QueuePlan>,
    pub warnings: Vec<String>,
}

impl PhysicalLayout {
    pub fn unit_count(&self) -> usize {
        self.units.iter().map(|u| u.copies).sum()
    }
}

/// Validate `graph` and compute its layout.
pub fn layout(graph: &GraphMeta) -> Result<PhysicalLayout, PlanError> {
    let report = validate_graph(graph)?;

    let units = report
        .order()
        .iter()
        .filter_map(|name| graph.find_step(name))
        .map(|s| UnitPlan {
            step: s.name.clone(),
            step_type: s.step_type.clone(),
            copies: s.copies,
            distribute: s.distribute,
            partition_fields: s
                .partitioning
                .as_ref()
                .map(|p| p.fields.clone())
                .unwrap_or_default(),
        })
        .collect();

    let mut queues = Vec::new();
    for hop in graph.hops.iter().filter(|h| h.enabled) {
        let (Some(from), Some(to)) = (graph.find_step(&hop.from), graph.find_step(&hop.to)) else {
            continue;
        };
        for (i, j) in copy_pairs(from.copies, to.copies, to.partitioning.is_some()) {
            queues.push(QueuePlan {
                from: hop.from.clone(),
                from_copy: i,
                to: hop.to.clone(),
                to_copy: j,
                error: hop.error,
            });
        }
    }

    Ok(PhysicalLayout {
        units,
        queues,
        warnings: report.warnings().to_vec(),
    })
}

/// Human-readable layout, one line per step then one per queue.
pub fn explain(graph: &GraphMeta) -> Result<String, PlanError> {
    let l = layout(graph)?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "graph '{}': {} steps, {} units, {} queues",
        graph.name,
        l.units.len(),
        l.unit_count(),
        l.queues.len()
    );
    for u in &l.units {
        let _ = write!(out, "  step {} [{}] x{}", u.step, u.step_type, u.copies);
        if u.distribute {
            out.push_str(" distribute");
        }
        if !u.partition_fields.is_empty() {
            let _ = write!(out, " partition_by({})", u.partition_fields.join(","));
        }
        out.push('\n');
    }
    for q in &l.queues {
        let _ = writeln!(
            out,
            "  queue {}{}",
            q.name(),
            if q.error { " (error)" } else { "" }
        );
    }
    for w in &l.warnings {
        let _ = writeln!(out, "  warning: {w}");
    }
    Ok(out)
}
