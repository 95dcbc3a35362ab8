//! Deployment planning.
//!
//! Orders the declared artifacts so that every artifact comes after the
//! libraries it links against and the artifacts its constructor references.
//! The plan is a plain value built before any network call, so it can be
//! printed or checked without touching a node.

use crate::error::DeployError;
use deployer_types::Artifact;
use std::collections::{BTreeSet, HashMap};

/// One artifact to deploy, at its position in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
	/// Zero-based position in the plan.
	pub index: usize,
	pub artifact: Artifact,
}

/// Ordered deployment steps; every dependency precedes its dependents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentPlan {
	pub(crate) steps: Vec<PlanStep>,
}

impl DeploymentPlan {
	pub fn steps(&self) -> &[PlanStep] {
		&self.steps
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Artifact names in deployment order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.steps.iter().map(|step| step.artifact.name.as_str())
	}
}

/// Builds a deployment plan from artifacts in declaration order.
///
/// Edges run from each artifact to its linked libraries and constructor
/// references. Among artifacts whose dependencies are all placed, the one
/// declared first goes next, so independent artifacts keep declaration order
/// and the result is the same for the same input.
///
/// # Errors
///
/// - [`DeployError::DuplicateArtifact`] if two artifacts share a name
/// - [`DeployError::UnknownDependency`] if a link or reference names an
///   undeclared artifact
/// - [`DeployError::NotALibrary`] if a link targets a contract
/// - [`DeployError::CyclicDependency`] if the graph has a cycle; no partial
///   order is returned
pub fn build_plan(artifacts: &[Artifact]) -> Result<DeploymentPlan, DeployError> {
	let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(artifacts.len());
	for (index, artifact) in artifacts.iter().enumerate() {
		if index_of.insert(artifact.name.as_str(), index).is_some() {
			return Err(DeployError::DuplicateArtifact(artifact.name.clone()));
		}
	}

	let mut in_degree = vec![0usize; artifacts.len()];
	let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); artifacts.len()];

	for (index, artifact) in artifacts.iter().enumerate() {
		for library in &artifact.libraries {
			let target = index_of.get(library.as_str()).ok_or_else(|| {
				DeployError::UnknownDependency {
					artifact: artifact.name.clone(),
					dependency: library.clone(),
				}
			})?;
			if !artifacts[*target].is_library() {
				return Err(DeployError::NotALibrary {
					artifact: artifact.name.clone(),
					library: library.clone(),
				});
			}
		}

		for dependency in artifact.dependencies() {
			let target = *index_of.get(dependency).ok_or_else(|| {
				DeployError::UnknownDependency {
					artifact: artifact.name.clone(),
					dependency: dependency.to_string(),
				}
			})?;
			dependents[target].push(index);
			in_degree[index] += 1;
		}
	}

	let mut ready: BTreeSet<usize> = in_degree
		.iter()
		.enumerate()
		.filter(|(_, degree)| **degree == 0)
		.map(|(index, _)| index)
		.collect();
	let mut order = Vec::with_capacity(artifacts.len());

	while let Some(next) = ready.pop_first() {
		order.push(next);
		for &dependent in &dependents[next] {
			in_degree[dependent] -= 1;
			if in_degree[dependent] == 0 {
				ready.insert(dependent);
			}
		}
	}

	if order.len() != artifacts.len() {
		let remaining = in_degree
			.iter()
			.enumerate()
			.filter(|(_, degree)| **degree > 0)
			.map(|(index, _)| artifacts[index].name.clone())
			.collect();
		return Err(DeployError::CyclicDependency(remaining));
	}

	let steps = order
		.into_iter()
		.enumerate()
		.map(|(index, original)| PlanStep {
			index,
			artifact: artifacts[original].clone(),
		})
		.collect();

	Ok(DeploymentPlan { steps })
}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_types::ConstructorArg;

	fn reference(name: &str) -> ConstructorArg {
		ConstructorArg::Artifact(name.to_string())
	}

	fn papyrus_migration() -> Vec<Artifact> {
		vec![
			Artifact::library("ECRecovery"),
			Artifact::library("ChannelLibrary").linking("ECRecovery"),
			Artifact::contract("EndpointRegistry"),
			Artifact::contract("PapyrusToken"),
			Artifact::contract("ChannelManager")
				.linking("ChannelLibrary")
				.with_arg(reference("PapyrusToken")),
		]
	}

	fn assert_dependencies_first(plan: &DeploymentPlan) {
		for step in plan.steps() {
			for dependency in step.artifact.dependencies() {
				assert!(
					plan.names().position(|name| name == dependency).unwrap() < step.index,
					"{} placed before its dependency {}",
					step.artifact.name,
					dependency
				);
			}
		}
	}

	#[test]
	fn test_migration_order() {
		let plan = build_plan(&papyrus_migration()).unwrap();

		assert_eq!(
			plan.names().collect::<Vec<_>>(),
			vec![
				"ECRecovery",
				"ChannelLibrary",
				"EndpointRegistry",
				"PapyrusToken",
				"ChannelManager"
			]
		);
		assert_dependencies_first(&plan);
	}

	#[test]
	fn test_dependencies_move_ahead_of_declaration_order() {
		let artifacts = vec![
			Artifact::contract("ChannelManager")
				.linking("ChannelLibrary")
				.with_arg(reference("PapyrusToken")),
			Artifact::contract("EndpointRegistry"),
			Artifact::contract("PapyrusToken"),
			Artifact::library("ChannelLibrary").linking("ECRecovery"),
			Artifact::library("ECRecovery"),
		];

		let plan = build_plan(&artifacts).unwrap();
		assert_eq!(
			plan.names().collect::<Vec<_>>(),
			vec![
				"EndpointRegistry",
				"PapyrusToken",
				"ECRecovery",
				"ChannelLibrary",
				"ChannelManager"
			]
		);
		assert_dependencies_first(&plan);
	}

	#[test]
	fn test_library_precedes_linking_contract() {
		let artifacts = vec![
			Artifact::contract("C").linking("L"),
			Artifact::library("L"),
		];
		let plan = build_plan(&artifacts).unwrap();
		assert_eq!(plan.names().collect::<Vec<_>>(), vec!["L", "C"]);
	}

	#[test]
	fn test_reference_precedes_referrer() {
		let artifacts = vec![
			Artifact::contract("M").with_arg(reference("T")),
			Artifact::contract("T"),
		];
		let plan = build_plan(&artifacts).unwrap();
		assert_eq!(plan.names().collect::<Vec<_>>(), vec!["T", "M"]);
	}

	#[test]
	fn test_plan_is_deterministic() {
		let artifacts = papyrus_migration();
		let first = build_plan(&artifacts).unwrap();
		for _ in 0..10 {
			assert_eq!(build_plan(&artifacts).unwrap(), first);
		}
	}

	#[test]
	fn test_cycle_is_rejected() {
		let artifacts = vec![
			Artifact::contract("Root"),
			Artifact::contract("A").with_arg(reference("B")),
			Artifact::contract("B").with_arg(reference("A")),
			Artifact::contract("Leaf").with_arg(reference("A")),
		];

		match build_plan(&artifacts) {
			Err(DeployError::CyclicDependency(names)) => {
				assert_eq!(names, vec!["A", "B", "Leaf"]);
			},
			other => panic!("expected a cycle, got {other:?}"),
		}
	}

	#[test]
	fn test_self_reference_is_a_cycle() {
		let artifacts = vec![Artifact::contract("A").with_arg(reference("A"))];
		assert!(matches!(
			build_plan(&artifacts),
			Err(DeployError::CyclicDependency(names)) if names == vec!["A"]
		));
	}

	#[test]
	fn test_duplicate_name_is_rejected() {
		let artifacts = vec![Artifact::contract("A"), Artifact::library("A")];
		assert!(matches!(
			build_plan(&artifacts),
			Err(DeployError::DuplicateArtifact(name)) if name == "A"
		));
	}

	#[test]
	fn test_unknown_dependency_is_rejected() {
		let artifacts = vec![Artifact::contract("M").with_arg(reference("T"))];
		assert!(matches!(
			build_plan(&artifacts),
			Err(DeployError::UnknownDependency { artifact, dependency })
				if artifact == "M" && dependency == "T"
		));
	}

	#[test]
	fn test_link_to_contract_is_rejected() {
		let artifacts = vec![
			Artifact::contract("T"),
			Artifact::contract("M").linking("T"),
		];
		assert!(matches!(
			build_plan(&artifacts),
			Err(DeployError::NotALibrary { artifact, library })
				if artifact == "M" && library == "T"
		));
	}

	#[test]
	fn test_empty_plan() {
		let plan = build_plan(&[]).unwrap();
		assert!(plan.is_empty());
		assert_eq!(plan.names().count(), 0);
	}
}
