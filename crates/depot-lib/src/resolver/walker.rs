//! The depth first engine shared by the walkers.
//!
//! The engine owns visited-set bookkeeping, cycle detection and target
//! classification; a [`WalkStrategy`] decides where dependencies come from
//! and what happens before and after each package is walked.

use std::collections::HashMap;
use std::sync::Arc;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::Package;
use crate::package::PackageDependency;
use crate::package::PackageIdentity;
use crate::package::PackageKey;
use crate::package::PackageTargets;
use crate::repository::Repository;

use super::ResolutionError;

#[derive(Debug, Clone, Copy)]
enum VisitState {
	Visiting,
	Visited(PackageTargets),
}

/// Bookkeeping for one top level resolve call. Never reused across calls.
pub(crate) struct WalkContext {
	visited: HashMap<PackageKey, VisitState>,
	/// The active chain, for cycle reporting.
	stack: Vec<PackageIdentity>,
}

impl WalkContext {
	pub(crate) fn new() -> Self {
		WalkContext { visited: Default::default(), stack: Default::default() }
	}
}

pub(crate) trait WalkStrategy {
	fn target_framework(&self) -> Option<&FrameworkName> {
		None
	}

	fn oracle(&self) -> &dyn FrameworkCompatibility;

	fn skip_dependencies(&self) -> bool {
		false
	}

	/// Whether mixed-target and external-depends-on-project checks apply.
	/// Removal walks turn this off so stale installed state stays removable.
	fn enforce_targets(&self) -> bool {
		true
	}

	/// Where a dependency of `package` comes from. `Ok(None)` skips the
	/// dependency entirely (already satisfied, or tolerated as missing).
	fn resolve_dependency(
		&mut self,
		package: &Package,
		dependency: &PackageDependency,
	) -> Result<Option<Arc<Package>>, ResolutionError>;

	fn before_walk(&mut self, package: &Arc<Package>) -> Result<(), ResolutionError> {
		let _ = package;
		Ok(())
	}

	/// Runs once per package after its whole subtree completed, i.e. in
	/// post order.
	fn after_walk(&mut self, package: &Arc<Package>) -> Result<(), ResolutionError> {
		let _ = package;
		Ok(())
	}
}

pub(crate) fn walk<S: WalkStrategy + ?Sized>(
	strategy: &mut S,
	ctx: &mut WalkContext,
	package: &Arc<Package>,
) -> Result<PackageTargets, ResolutionError> {
	let key = package.identity().key();

	if let Some(VisitState::Visited(targets)) = ctx.visited.get(&key) {
		return Ok(*targets)
	}

	/* Re-entry by id anywhere on the active chain is a cycle even when the
	 * versions differ: A 1.0 => B 1.0 => A 1.5 can never be satisfied. */
	if let Some(position) = ctx.stack.iter().position(|i| i.id.eq_ignore_ascii_case(&package.id)) {
		let mut chain: Vec<PackageIdentity> = ctx.stack[position..].to_vec();
		chain.push(package.identity());
		return Err(ResolutionError::CircularDependency { chain })
	}

	log::debug!("walking '{}'", package);
	ctx.visited.insert(key.clone(), VisitState::Visiting);
	ctx.stack.push(package.identity());

	strategy.before_walk(package)?;

	let mut project_child: Option<PackageIdentity> = None;
	let mut external_child = false;

	if !strategy.skip_dependencies() {
		let dependencies: Vec<PackageDependency> = package
			.dependencies_for(strategy.target_framework(), strategy.oracle())
			.into_iter()
			.cloned()
			.collect();

		for dependency in dependencies {
			if let Some(child) = strategy.resolve_dependency(package, &dependency)? {
				match walk(strategy, ctx, &child)? {
					PackageTargets::Project => {
						if project_child.is_none() {
							project_child = Some(child.identity());
						}
					}
					PackageTargets::External => external_child = true,
					_ => {}
				}
			}
		}
	}

	let own = package.own_targets();
	let targets = if strategy.enforce_targets() {
		match own {
			Some(PackageTargets::External) => {
				if let Some(dependency) = project_child {
					return Err(ResolutionError::InvalidDependencyTarget { package: package.identity(), dependency })
				}
				PackageTargets::External
			}
			Some(targets) => targets,
			None => {
				/* Dependency-only packages take the classification of their closure */
				if project_child.is_some() && external_child {
					return Err(ResolutionError::MixedDependencyTargets { package: package.identity() })
				}
				if project_child.is_some() {
					PackageTargets::Project
				} else if external_child {
					PackageTargets::External
				} else {
					PackageTargets::None
				}
			}
		}
	} else {
		own.unwrap_or(PackageTargets::None)
	};

	ctx.stack.pop();
	ctx.visited.insert(key, VisitState::Visited(targets));

	strategy.after_walk(package)?;

	Ok(targets)
}

struct ClassifyStrategy<'a> {
	repository: &'a dyn Repository,
	framework: Option<&'a FrameworkName>,
	oracle: &'a dyn FrameworkCompatibility,
}

impl WalkStrategy for ClassifyStrategy<'_> {
	fn target_framework(&self) -> Option<&FrameworkName> {
		self.framework
	}

	fn oracle(&self) -> &dyn FrameworkCompatibility {
		self.oracle
	}

	fn resolve_dependency(
		&mut self,
		_package: &Package,
		dependency: &PackageDependency,
	) -> Result<Option<Arc<Package>>, ResolutionError> {
		/* Classification only: a dependency we can't see contributes nothing */
		Ok(self.repository.find_packages(&dependency.id)
			.into_iter()
			.filter(|p| dependency.matches(&p.version))
			.last())
	}
}

/// What `package` targets, following its dependency closure through
/// `repository` where the package itself is dependency-only.
pub(crate) fn classify(
	package: &Arc<Package>,
	repository: &dyn Repository,
	framework: Option<&FrameworkName>,
	oracle: &dyn FrameworkCompatibility,
) -> Result<PackageTargets, ResolutionError> {
	let mut strategy = ClassifyStrategy { repository, framework, oracle };
	walk(&mut strategy, &mut WalkContext::new(), package)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::DefaultFrameworkCompatibility;
	use crate::package::DependencySet;
	use crate::package::SemanticVersion;
	use crate::repository::InMemoryRepository;

	fn v(s: &str) -> SemanticVersion { SemanticVersion::parse(s).unwrap() }

	fn package(id: &str, version: &str, deps: &[&str]) -> Package {
		let mut p = Package::new(id, v(version));
		if !deps.is_empty() {
			p.dependency_sets = vec![DependencySet {
				target_framework: None,
				dependencies: deps.iter().map(|d| PackageDependency::new(*d, None)).collect(),
			}];
		}
		p
	}

	fn with_assembly(mut p: Package) -> Package {
		p.assembly_references = vec![format!("{}.dll", p.id)];
		p
	}

	fn with_tool(mut p: Package) -> Package {
		p.tools = vec!["init.ps1".to_string()];
		p
	}

	#[test]
	fn classification_inherits_through_dependency_only_chain() {
		let repo = InMemoryRepository::with_packages("source", vec![
			package("Meta", "1.0", &["Leaf"]),
			with_assembly(package("Leaf", "1.0", &[])),
		]);
		let root = repo.find_package("Meta", &v("1.0")).unwrap();
		assert_eq!(classify(&root, &repo, None, &DefaultFrameworkCompatibility).unwrap(), PackageTargets::Project);
	}

	#[test]
	fn mixed_children_of_dependency_only_package_fail() {
		let repo = InMemoryRepository::with_packages("source", vec![
			package("Meta", "1.0", &["Lib", "Tool"]),
			with_assembly(package("Lib", "1.0", &[])),
			with_tool(package("Tool", "1.0", &[])),
		]);
		let root = repo.find_package("Meta", &v("1.0")).unwrap();
		let err = classify(&root, &repo, None, &DefaultFrameworkCompatibility).unwrap_err();
		assert!(matches!(err, ResolutionError::MixedDependencyTargets { ref package } if package.id == "Meta"));
	}

	#[test]
	fn external_package_cannot_reach_project_package() {
		let repo = InMemoryRepository::with_packages("source", vec![
			with_tool(package("Solution", "1.0", &["Lib"])),
			with_assembly(package("Lib", "1.0", &[])),
		]);
		let root = repo.find_package("Solution", &v("1.0")).unwrap();
		let err = classify(&root, &repo, None, &DefaultFrameworkCompatibility).unwrap_err();
		assert_eq!(err.to_string(), "External packages cannot depend on packages that target projects. 'Solution 1.0' depends on 'Lib 1.0'.");
	}

	#[test]
	fn cycle_is_detected_by_id_across_versions() {
		let repo = InMemoryRepository::with_packages("source", vec![
			{
				let mut a = package("A", "1.0", &[]);
				a.dependency_sets = vec![DependencySet {
					target_framework: None,
					dependencies: vec![PackageDependency::new("B", None)],
				}];
				a
			},
			{
				let mut b = package("B", "1.0", &[]);
				b.dependency_sets = vec![DependencySet {
					target_framework: None,
					dependencies: vec![PackageDependency::new("A", Some(crate::package::VersionSpec::parse("1.5").unwrap()))],
				}];
				b
			},
			package("A", "1.5", &["B"]),
		]);
		let root = repo.find_package("A", &v("1.0")).unwrap();
		let err = classify(&root, &repo, None, &DefaultFrameworkCompatibility).unwrap_err();
		assert_eq!(err.to_string(), "Circular dependency detected 'A 1.0 => B 1.0 => A 1.5'.");
	}
}
