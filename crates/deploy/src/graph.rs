//! Dependency graph over the component set.
//!
//! An edge `A -> B` means A's constructor needs B's address, so B must be
//! deployed first. The graph is built once from the plan and its ordering is
//! validated before any remote call is made.

use std::collections::{BTreeSet, HashMap};

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};

use crate::{
    ComponentName, ComponentSpec,
    error::{DeployError, Result},
};

/// `from` requires `to`'s address before it can be deployed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: ComponentName,
    pub to: ComponentName,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Edges point from a dependency to its dependents.
    graph: DiGraph<ComponentName, ()>,
    indices: HashMap<ComponentName, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from component specs, in declaration order.
    ///
    /// Duplicate names are an invalid plan; a reference to a component outside
    /// the set can never resolve and fails with `UnresolvedDependency`.
    pub fn from_specs(specs: &[ComponentSpec]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::with_capacity(specs.len());

        for spec in specs {
            if indices.contains_key(&spec.name) {
                return Err(DeployError::InvalidPlan(format!(
                    "component `{}` is declared twice",
                    spec.name
                )));
            }
            let idx = graph.add_node(spec.name.clone());
            indices.insert(spec.name.clone(), idx);
        }

        for spec in specs {
            let dependent = indices[&spec.name];
            for dependency in spec.dependencies() {
                let Some(&dep_idx) = indices.get(dependency) else {
                    return Err(DeployError::UnresolvedDependency {
                        component: dependency.clone(),
                        required_by: spec.name.to_string(),
                    });
                };
                graph.update_edge(dep_idx, dependent, ());
            }
        }

        Ok(Self { graph, indices })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &ComponentName) -> bool {
        self.indices.contains_key(name)
    }

    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| DependencyEdge {
                from: self.graph[edge.target()].clone(),
                to: self.graph[edge.source()].clone(),
            })
            .collect()
    }

    /// Direct dependencies of a component, in declaration order.
    pub fn dependencies_of(&self, name: &ComponentName) -> Vec<ComponentName> {
        let Some(&idx) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        deps.sort();
        deps.into_iter().map(|i| self.graph[i].clone()).collect()
    }

    /// Deterministic deployment order: dependencies first, ties broken by
    /// declaration order.
    pub fn ordering(&self) -> Result<Vec<ComponentName>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(idx) = ready.pop_first() {
            order.push(self.graph[idx].clone());
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                in_degree[dependent.index()] -= 1;
                if in_degree[dependent.index()] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let stuck = self
                .graph
                .node_indices()
                .find(|idx| in_degree[idx.index()] > 0)
                .map(|idx| self.graph[idx].clone());

            if let Some(component) = stuck {
                return Err(DeployError::CyclicDependency { component });
            }
        }

        Ok(order)
    }

    /// Check that `order` deploys every dependency before its dependents.
    ///
    /// Returns `UnresolvedDependency` for the first forward reference found.
    pub fn check_order(&self, order: &[ComponentName]) -> Result<()> {
        let mut deployed = BTreeSet::new();
        for name in order {
            for dependency in self.dependencies_of(name) {
                if !deployed.contains(&dependency) {
                    return Err(DeployError::UnresolvedDependency {
                        component: dependency,
                        required_by: name.to_string(),
                    });
                }
            }
            deployed.insert(name.clone());
        }
        Ok(())
    }
}
