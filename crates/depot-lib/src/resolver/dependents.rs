//! Reverse dependency lookups over an installed repository.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use petgraph::prelude::*;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::Package;
use crate::package::PackageKey;
use crate::package::VersionSpec;

/// An index of who depends on what, built once over a repository snapshot.
///
/// Edges run dependent → dependency and only exist where the dependency's
/// declared range is satisfied by the target's version. Build a fresh walker
/// per resolve call; the index does not follow later repository mutation.
pub struct DependentsWalker {
	graph: DiGraph<Arc<Package>, Option<VersionSpec>>,
	nodes: HashMap<PackageKey, NodeIndex>,
	/// Dependency declarations keyed by lowercased target id, for queries
	/// about versions the repository does not hold.
	declarations: HashMap<String, Vec<(NodeIndex, Option<VersionSpec>)>>,
}

impl DependentsWalker {
	pub fn new(
		repository: &dyn crate::repository::Repository,
		framework: Option<&FrameworkName>,
		oracle: &dyn FrameworkCompatibility,
	) -> Self {
		let packages = repository.get_packages();

		let mut graph = DiGraph::with_capacity(packages.len(), packages.len());
		let mut nodes = HashMap::new();
		let mut by_id: HashMap<String, Vec<NodeIndex>> = HashMap::new();

		for package in &packages {
			let index = graph.add_node(package.clone());
			nodes.insert(package.identity().key(), index);
			by_id.entry(package.id.to_lowercase()).or_default().push(index);
		}

		let mut declarations: HashMap<String, Vec<(NodeIndex, Option<VersionSpec>)>> = HashMap::new();
		for package in &packages {
			let source = nodes[&package.identity().key()];
			for dependency in package.dependencies_for(framework, oracle) {
				declarations.entry(dependency.id.to_lowercase())
					.or_default()
					.push((source, dependency.version_spec.clone()));

				for target in by_id.get(&dependency.id.to_lowercase()).into_iter().flatten() {
					if dependency.matches(&graph[*target].version) {
						graph.add_edge(source, *target, dependency.version_spec.clone());
					}
				}
			}
		}

		DependentsWalker { graph, nodes, declarations }
	}

	/// Every package in the snapshot whose declared range on this id is
	/// satisfied by `package`'s version.
	pub fn get_dependents(&self, package: &Package) -> Vec<Arc<Package>> {
		if let Some(index) = self.nodes.get(&package.identity().key()) {
			let mut seen = HashSet::new();
			return self.graph.neighbors_directed(*index, Incoming)
				.filter(|i| seen.insert(*i))
				.map(|i| self.graph[i].clone())
				.collect()
		}

		/* The exact version isn't in the snapshot; check declarations instead */
		let mut seen = HashSet::new();
		self.declarations.get(&package.id.to_lowercase())
			.into_iter()
			.flatten()
			.filter(|(_, spec)| spec.as_ref().map_or(true, |s| s.satisfies(&package.version)))
			.filter(|(index, _)| seen.insert(*index))
			.map(|(index, _)| self.graph[*index].clone())
			.collect()
	}

	pub fn is_depended_on(&self, package: &Package) -> bool {
		!self.get_dependents(package).is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::DefaultFrameworkCompatibility;
	use crate::package::DependencySet;
	use crate::package::PackageDependency;
	use crate::package::SemanticVersion;
	use crate::repository::InMemoryRepository;
	use crate::repository::Repository;

	fn v(s: &str) -> SemanticVersion { SemanticVersion::parse(s).unwrap() }

	fn package(id: &str, version: &str, deps: &[(&str, Option<&str>)]) -> Package {
		let mut p = Package::new(id, v(version));
		if !deps.is_empty() {
			p.dependency_sets = vec![DependencySet {
				target_framework: None,
				dependencies: deps.iter()
					.map(|(d, spec)| PackageDependency::new(*d, spec.map(|s| VersionSpec::parse(s).unwrap())))
					.collect(),
			}];
		}
		p
	}

	fn walker(packages: Vec<Package>) -> (DependentsWalker, InMemoryRepository) {
		let repo = InMemoryRepository::with_packages("installed", packages);
		(DependentsWalker::new(&repo, None, &DefaultFrameworkCompatibility), repo)
	}

	#[test]
	fn dependents_matched_case_insensitively() {
		let (w, repo) = walker(vec![
			package("A", "1.0", &[("b", Some("1.0"))]),
			package("B", "1.0", &[]),
		]);
		let b = repo.find_package("B", &v("1.0")).unwrap();
		let dependents = w.get_dependents(&b);
		assert_eq!(dependents.len(), 1);
		assert_eq!(dependents[0].id, "A");
	}

	#[test]
	fn dependents_respect_version_ranges() {
		let (w, repo) = walker(vec![
			package("A", "1.0", &[("B", Some("[1.0,2.0)"))]),
			package("B", "1.0", &[]),
			package("B", "2.0", &[]),
		]);
		assert!(w.is_depended_on(&repo.find_package("B", &v("1.0")).unwrap()));
		assert!(!w.is_depended_on(&repo.find_package("B", &v("2.0")).unwrap()));
	}

	#[test]
	fn hypothetical_version_checked_against_declarations() {
		let (w, _) = walker(vec![
			package("A", "1.0", &[("B", Some("[1.0,2.0)"))]),
			package("B", "1.0", &[]),
		]);
		/* B 1.5 isn't installed, but A's range would accept it */
		assert!(w.is_depended_on(&Package::new("B", v("1.5"))));
		assert!(!w.is_depended_on(&Package::new("B", v("2.0"))));
	}

	#[test]
	fn leaf_package_has_no_dependents() {
		let (w, repo) = walker(vec![
			package("A", "1.0", &[("B", None)]),
			package("B", "1.0", &[]),
		]);
		assert!(!w.is_depended_on(&repo.find_package("A", &v("1.0")).unwrap()));
	}
}
