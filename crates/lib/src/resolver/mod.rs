//! Part dependency resolution.
//!
//! `PartGraph` is built once from the declared `after` lists. It computes
//! the project's canonical topological part order at construction time
//! (the one fixed order every traversal uses) and answers dependency
//! queries against it. Dependency declarations are validated here
//! (unknown names, cycles) so the executor can assume an acyclic graph.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use thiserror::Error;

use crate::project::Part;
use crate::state::store::{StateStore, StoreError};
use crate::status::StatusCache;
use crate::step::Step;

/// Errors raised while building or querying the part graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("no such part: '{0}'")]
  UnknownPart(String),

  #[error("part '{part}' depends on unknown part '{dependency}'")]
  UnknownDependency { part: String, dependency: String },

  #[error("dependency cycle involving part '{0}'")]
  Cycle(String),
}

/// The project's parts with their declared dependency relationships.
pub struct PartGraph {
  /// Parts in canonical topological order.
  parts: Vec<Part>,
  /// Part name → index into `parts`.
  index: HashMap<String, usize>,
  /// Direct dependencies, as indices into `parts`.
  dependencies: Vec<Vec<usize>>,
}

impl PartGraph {
  /// Build the graph and compute the canonical part order.
  ///
  /// Parts are inserted in the given order (name order, as produced by
  /// the configuration provider), so the canonical order is deterministic
  /// across runs of the same configuration.
  pub fn new(parts: Vec<Part>) -> Result<Self, GraphError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: Vec<NodeIndex> = Vec::with_capacity(parts.len());
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for (i, part) in parts.iter().enumerate() {
      nodes.push(graph.add_node(i));
      by_name.insert(part.name.as_str(), i);
    }

    // Edge from dependency to dependent.
    for (i, part) in parts.iter().enumerate() {
      for dependency in &part.after {
        let Some(&dep) = by_name.get(dependency.as_str()) else {
          return Err(GraphError::UnknownDependency {
            part: part.name.clone(),
            dependency: dependency.clone(),
          });
        };
        graph.add_edge(nodes[dep], nodes[i], ());
      }
    }

    // Kahn's algorithm; ready nodes are taken in insertion (name) order
    // so the canonical order is stable for a given configuration.
    let mut in_degree: Vec<usize> = (0..parts.len())
      .map(|i| graph.neighbors_directed(nodes[i], Direction::Incoming).count())
      .collect();
    let mut placed = vec![false; parts.len()];
    let mut order: Vec<usize> = Vec::with_capacity(parts.len());

    while order.len() < parts.len() {
      let Some(next) = (0..parts.len()).find(|&i| !placed[i] && in_degree[i] == 0) else {
        let culprit = (0..parts.len()).find(|&i| !placed[i]).unwrap_or(0);
        return Err(GraphError::Cycle(parts[culprit].name.clone()));
      };

      placed[next] = true;
      order.push(next);
      for successor in graph.neighbors_directed(nodes[next], Direction::Outgoing) {
        let i = graph[successor];
        in_degree[i] = in_degree[i].saturating_sub(1);
      }
    }

    let mut slots: Vec<Option<Part>> = parts.into_iter().map(Some).collect();
    let mut ordered: Vec<Part> = Vec::with_capacity(slots.len());
    for i in order {
      if let Some(part) = slots[i].take() {
        ordered.push(part);
      }
    }

    let index: HashMap<String, usize> = ordered
      .iter()
      .enumerate()
      .map(|(i, part)| (part.name.clone(), i))
      .collect();

    let dependencies: Vec<Vec<usize>> = ordered
      .iter()
      .map(|part| {
        let mut deps: Vec<usize> = part.after.iter().map(|name| index[name]).collect();
        deps.sort_unstable();
        deps
      })
      .collect();

    Ok(Self {
      parts: ordered,
      index,
      dependencies,
    })
  }

  /// All parts in canonical topological order.
  pub fn parts(&self) -> &[Part] {
    &self.parts
  }

  pub fn part_names(&self) -> Vec<String> {
    self.parts.iter().map(|p| p.name.clone()).collect()
  }

  /// Look up a part by name.
  pub fn part(&self, name: &str) -> Result<&Part, GraphError> {
    self
      .index
      .get(name)
      .map(|&i| &self.parts[i])
      .ok_or_else(|| GraphError::UnknownPart(name.to_string()))
  }

  /// Materialize a requested part-name set as parts in canonical order.
  pub fn expand(&self, requested: &[String]) -> Result<Vec<&Part>, GraphError> {
    for name in requested {
      if !self.index.contains_key(name) {
        return Err(GraphError::UnknownPart(name.clone()));
      }
    }

    Ok(
      self
        .parts
        .iter()
        .filter(|p| requested.contains(&p.name))
        .collect(),
    )
  }

  /// A part's direct dependencies, in canonical order.
  pub fn dependencies_of(&self, name: &str) -> Result<Vec<&Part>, GraphError> {
    let &i = self
      .index
      .get(name)
      .ok_or_else(|| GraphError::UnknownPart(name.to_string()))?;
    Ok(self.dependencies[i].iter().map(|&d| &self.parts[d]).collect())
  }

  /// The dependencies of `part` that have not yet reached the minimum
  /// prerequisite step required before `part` may start `target_step`.
  ///
  /// Returned in canonical order; never contains `part` itself.
  pub fn prerequisites_for(
    &self,
    part: &Part,
    target_step: Step,
    store: &StateStore,
    cache: &mut StatusCache,
    project_options: &BTreeMap<String, Value>,
  ) -> Result<Vec<&Part>, PrerequisiteError> {
    let prerequisite_step = target_step.prerequisite_step();

    let mut pending = Vec::new();
    for dependency in self.dependencies_of(&part.name)? {
      if cache.step_should_run(store, dependency, project_options, prerequisite_step)? {
        pending.push(dependency);
      }
    }
    Ok(pending)
  }
}

/// Errors raised while computing prerequisite parts.
#[derive(Debug, Error)]
pub enum PrerequisiteError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Store(#[from] StoreError),
}
