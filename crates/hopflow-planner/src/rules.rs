//! Static validation rules for a step graph.
//!
//! Everything here is checked before a single thread starts. Problems that
//! only show at run time (unknown step types, bad step config, missing key
//! fields in rows) are left to the executor and the steps themselves.

use std::collections::{HashMap, HashSet, VecDeque};

use hopflow_core::graph::GraphMeta;

use crate::error::PlanError;

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    order: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationReport {
    /// Step names in a topological order of the enabled hops (declaration
    /// order breaks ties).
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Suspicious but runnable settings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub fn validate_graph(graph: &GraphMeta) -> Result<ValidationReport, PlanError> {
    if graph.steps.is_empty() {
        return Err(PlanError::Empty);
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, step) in graph.steps.iter().enumerate() {
        if index.insert(step.name.as_str(), i).is_some() {
            return Err(PlanError::DuplicateStep(step.name.clone()));
        }
        if step.copies == 0 {
            return Err(PlanError::ZeroCopies(step.name.clone()));
        }
        if let Some(p) = &step.partitioning {
            if p.fields.is_empty() {
                return Err(PlanError::InvalidStep {
                    step: step.name.clone(),
                    message: "partitioning needs at least one key field".into(),
                });
            }
        }
    }

    let mut warnings = Vec::new();
    let mut seen_hops = HashSet::new();
    let mut error_hops: HashMap<&str, usize> = HashMap::new();
    let mut in_degree = vec![0usize; graph.steps.len()];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); graph.steps.len()];

    for hop in &graph.hops {
        for endpoint in [&hop.from, &hop.to] {
            if !index.contains_key(endpoint.as_str()) {
                return Err(PlanError::UnknownStep {
                    from: hop.from.clone(),
                    to: hop.to.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if !hop.enabled {
            continue;
        }
        if hop.from == hop.to {
            return Err(PlanError::SelfLoop(hop.from.clone()));
        }
        if !seen_hops.insert((hop.from.as_str(), hop.to.as_str())) {
            return Err(PlanError::DuplicateHop {
                from: hop.from.clone(),
                to: hop.to.clone(),
            });
        }
        if hop.error {
            let n = error_hops.entry(hop.from.as_str()).or_insert(0);
            *n += 1;
            if *n > 1 {
                return Err(PlanError::MultipleErrorHops(hop.from.clone()));
            }
        }
        let (from, to) = (index[hop.from.as_str()], index[hop.to.as_str()]);
        edges[from].push(to);
        in_degree[to] += 1;
    }

    for step in &graph.steps {
        if step.partitioning.is_some() && step.copies == 1 {
            warnings.push(format!(
                "step '{}' declares partitioning but runs a single copy",
                step.name
            ));
        }
        if step.error_handling.is_some() && !error_hops.contains_key(step.name.as_str()) {
            warnings.push(format!(
                "step '{}' has error handling but no error hop; row errors will be fatal",
                step.name
            ));
        }
    }

    // Kahn's algorithm; whatever is left with a non-zero in-degree sits on a cycle.
    let mut queue: VecDeque<usize> = (0..graph.steps.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(graph.steps.len());
    while let Some(i) = queue.pop_front() {
        order.push(graph.steps[i].name.clone());
        for &next in &edges[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    if order.len() != graph.steps.len() {
        let cyclic = (0..graph.steps.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph.steps[i].name.clone())
            .collect();
        return Err(PlanError::Cycle(cyclic));
    }

    Ok(ValidationReport { order, warnings })
}
