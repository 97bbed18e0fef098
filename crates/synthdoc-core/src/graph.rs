use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Model;

/// Serializable summary of the dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub nodes: usize,
    pub edges: usize,
    pub order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Model dependency graph with a resolved execution order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependants: BTreeMap<String, BTreeSet<String>>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build the graph and order it; fails on unknown names or cycles.
    pub fn build(models: &[Model]) -> Result<Self> {
        let dependencies = build_adjacency(models)?;
        let dependants = invert(&dependencies);
        let order = toposort(&dependencies, &dependants).map_err(Error::CyclicDependencies)?;

        Ok(Self {
            dependencies,
            dependants,
            order,
        })
    }

    /// Models in execution order: every model after all of its dependencies.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn dependencies(&self, model: &str) -> impl Iterator<Item = &str> {
        self.dependencies
            .get(model)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Models that name `model` as a dependency.
    pub fn dependants(&self, model: &str) -> impl Iterator<Item = &str> {
        self.dependants
            .get(model)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn has_dependants(&self, model: &str) -> bool {
        self.dependants
            .get(model)
            .is_some_and(|dependants| !dependants.is_empty())
    }

    pub fn report(&self) -> DependencyReport {
        DependencyReport {
            nodes: self.dependencies.len(),
            edges: self.dependencies.values().map(BTreeSet::len).sum(),
            order: Some(self.order.clone()),
            cycle: None,
        }
    }
}

/// Report form of [`DependencyGraph::build`] that keeps cycles as data.
pub fn build_dependency_report(models: &[Model]) -> Result<DependencyReport> {
    let dependencies = build_adjacency(models)?;
    let dependants = invert(&dependencies);
    let nodes = dependencies.len();
    let edges = dependencies.values().map(BTreeSet::len).sum();

    Ok(match toposort(&dependencies, &dependants) {
        Ok(order) => DependencyReport {
            nodes,
            edges,
            order: Some(order),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            nodes,
            edges,
            order: None,
            cycle: Some(cycle),
        },
    })
}

fn build_adjacency(models: &[Model]) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for model in models {
        graph.entry(model.name.clone()).or_default();
    }

    for model in models {
        for dependency in &model.data.dependencies {
            if !graph.contains_key(dependency) {
                return Err(Error::UnknownDependency {
                    model: model.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            graph
                .entry(model.name.clone())
                .or_default()
                .insert(dependency.clone());
        }
    }

    Ok(graph)
}

fn invert(dependencies: &BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, BTreeSet<String>> {
    let mut dependants: BTreeMap<String, BTreeSet<String>> = dependencies
        .keys()
        .map(|node| (node.clone(), BTreeSet::new()))
        .collect();
    for (node, targets) in dependencies {
        for target in targets {
            dependants
                .entry(target.clone())
                .or_default()
                .insert(node.clone());
        }
    }
    dependants
}

/// Kahn's algorithm; ties go to the model with fewer dependencies, then by name.
fn toposort(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
    dependants: &BTreeMap<String, BTreeSet<String>>,
) -> std::result::Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = dependencies
        .iter()
        .map(|(node, targets)| (node.as_str(), targets.len()))
        .collect();
    let weight = |node: &str| dependencies.get(node).map_or(0, BTreeSet::len);

    let mut ready: BTreeSet<(usize, &str)> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| (weight(*node), *node))
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(entry) = ready.pop_first() {
        let (_, node) = entry;
        order.push(node.to_string());

        for dependant in dependants.get(node).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(dependant.as_str()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert((weight(dependant.as_str()), dependant.as_str()));
                }
            }
        }
    }

    if order.len() == dependencies.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(node, _)| node.to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelData;

    fn model(name: &str, dependencies: &[&str]) -> Model {
        Model {
            name: name.to_string(),
            data: ModelData {
                dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
                ..ModelData::default()
            },
            ..Model::default()
        }
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|item| item == name).unwrap()
    }

    #[test]
    fn order_places_models_after_their_dependencies() {
        let models = vec![
            model("orders", &["users", "products"]),
            model("reviews", &["orders", "users"]),
            model("users", &[]),
            model("products", &["categories"]),
            model("categories", &[]),
        ];

        let graph = DependencyGraph::build(&models).expect("graph");
        let order = graph.order();
        assert_eq!(order.len(), models.len());
        for model in &models {
            for dependency in &model.data.dependencies {
                assert!(position(order, dependency) < position(order, &model.name));
            }
        }
    }

    #[test]
    fn ties_prefer_fewer_dependencies() {
        let models = vec![
            model("base", &[]),
            model("a_heavy", &["base", "other"]),
            model("other", &[]),
            model("z_light", &["base"]),
        ];

        let graph = DependencyGraph::build(&models).expect("graph");
        assert!(position(graph.order(), "z_light") < position(graph.order(), "a_heavy"));
    }

    #[test]
    fn dependants_are_the_inverse_relation() {
        let models = vec![
            model("users", &[]),
            model("orders", &["users"]),
            model("reviews", &["users"]),
        ];

        let graph = DependencyGraph::build(&models).expect("graph");
        let dependants: Vec<&str> = graph.dependants("users").collect();
        assert_eq!(dependants, vec!["orders", "reviews"]);
        assert!(!graph.has_dependants("orders"));
        assert_eq!(graph.dependencies("orders").collect::<Vec<_>>(), vec!["users"]);
    }

    #[test]
    fn cycles_are_reported_with_offending_models() {
        let models = vec![
            model("a", &["c"]),
            model("b", &["a"]),
            model("c", &["b"]),
            model("free", &[]),
        ];

        let err = DependencyGraph::build(&models).unwrap_err();
        match err {
            Error::CyclicDependencies(nodes) => assert_eq!(nodes, vec!["a", "b", "c"]),
            other => panic!("unexpected error: {other}"),
        }

        let report = build_dependency_report(&models).expect("report");
        assert!(report.order.is_none());
        assert_eq!(report.cycle.map(|cycle| cycle.len()), Some(3));
    }

    #[test]
    fn unknown_dependencies_are_configuration_errors() {
        let models = vec![model("orders", &["ghosts"])];
        assert!(matches!(
            DependencyGraph::build(&models),
            Err(Error::UnknownDependency { .. })
        ));
    }
}
