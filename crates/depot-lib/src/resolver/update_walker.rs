//! Resolves replace sets: paired uninstall/install operations that move an
//! installed package (and whatever must follow it) to a different version.

use std::collections::HashMap;
use std::sync::Arc;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::DefaultFrameworkCompatibility;
use crate::package::Package;
use crate::package::PackageDependency;
use crate::package::PackageIdentity;
use crate::package::PackageTargets;
use crate::package::SemanticVersion;
use crate::repository::ConstraintProvider;
use crate::repository::Logger;
use crate::repository::MessageLevel;
use crate::repository::NullConstraintProvider;
use crate::repository::NullLogger;
use crate::repository::Repository;

use super::dependency_resolver;
use super::dependency_resolver::DependencyVersion;
use super::dependents::DependentsWalker;
use super::walker;
use super::PackageAction;
use super::PackageOperation;
use super::ResolutionError;

/// One node's contribution to the plan, spliced so that uninstalls run
/// dependents first and installs run dependencies first.
struct Replacement {
	uninstalls: Vec<PackageOperation>,
	installs: Vec<PackageOperation>,
}

/// Computes the operations for moving an installed package to the given
/// version, pulling every affected package along.
///
/// Every dependent of a replaced version must remain satisfiable against the
/// replacement itself; dependents that are not are themselves moved to a
/// compatible version when one exists and `update_dependencies` allows it,
/// and fail the resolve otherwise.
pub struct UpdateWalker<'a> {
	local: &'a dyn Repository,
	source: &'a dyn Repository,
	constraints: &'a dyn ConstraintProvider,
	logger: &'a dyn Logger,
	oracle: &'a dyn FrameworkCompatibility,
	target_framework: Option<FrameworkName>,
	dependency_version: DependencyVersion,
	allow_prerelease: bool,
	update_dependencies: bool,
	accepted_targets: PackageTargets,
	client_version: SemanticVersion,

	/// Lowercased id → the version that id is moving to in this resolve.
	replacing: HashMap<String, PackageIdentity>,
}

impl<'a> UpdateWalker<'a> {
	pub fn new(local: &'a dyn Repository, source: &'a dyn Repository) -> Self {
		UpdateWalker {
			local,
			source,
			constraints: &NullConstraintProvider,
			logger: &NullLogger,
			oracle: &DefaultFrameworkCompatibility,
			target_framework: None,
			dependency_version: Default::default(),
			allow_prerelease: false,
			update_dependencies: true,
			accepted_targets: PackageTargets::All,
			client_version: crate::client_version(),
			replacing: Default::default(),
		}
	}

	pub fn constraints(mut self, constraints: &'a dyn ConstraintProvider) -> Self {
		self.constraints = constraints;
		self
	}

	pub fn logger(mut self, logger: &'a dyn Logger) -> Self {
		self.logger = logger;
		self
	}

	pub fn oracle(mut self, oracle: &'a dyn FrameworkCompatibility) -> Self {
		self.oracle = oracle;
		self
	}

	pub fn target_framework(mut self, framework: FrameworkName) -> Self {
		self.target_framework = Some(framework);
		self
	}

	pub fn dependency_version(mut self, policy: DependencyVersion) -> Self {
		self.dependency_version = policy;
		self
	}

	pub fn allow_prerelease(mut self, allow: bool) -> Self {
		self.allow_prerelease = allow;
		self
	}

	/// When off, the update is restricted to exactly the named package; a
	/// required transitive change fails the resolve instead of happening
	/// silently.
	pub fn update_dependencies(mut self, update: bool) -> Self {
		self.update_dependencies = update;
		self
	}

	/// Roots whose classification is not accepted are skipped, not failed.
	/// Used by bulk update-everything flows.
	pub fn accepted_targets(mut self, targets: PackageTargets) -> Self {
		self.accepted_targets = targets;
		self
	}

	/// The ordered replace set for moving the installed version of
	/// `package`'s id to `package` itself.
	pub fn resolve_operations(&mut self, package: Arc<Package>) -> Result<Vec<PackageOperation>, ResolutionError> {
		self.replacing.clear();

		let targets = walker::classify(&package, self.source, self.target_framework.as_ref(), self.oracle)?;
		if !self.accepted_targets.accepts(targets) {
			self.logger.log(MessageLevel::Info, &format!("skipping update of '{}', package targets do not match", package));
			return Ok(Vec::new())
		}

		let dependents = DependentsWalker::new(self.local, self.target_framework.as_ref(), self.oracle);

		let Replacement { mut uninstalls, installs } = self.update_package(&package, &dependents)?;
		uninstalls.extend(installs);
		Ok(uninstalls)
	}

	fn update_package(
		&mut self,
		package: &Arc<Package>,
		dependents: &DependentsWalker,
	) -> Result<Replacement, ResolutionError> {
		let key = package.id.to_lowercase();
		if self.replacing.contains_key(&key) {
			return Ok(Replacement { uninstalls: Vec::new(), installs: Vec::new() })
		}

		if let Some(required) = &package.min_client_version {
			if required > &self.client_version {
				return Err(ResolutionError::ClientVersionTooLow {
					package: package.identity(),
					required: required.clone(),
					current: self.client_version.clone(),
				})
			}
		}

		/* A pin that forbids the candidate version is a hard stop */
		if let Some(pin) = self.constraints.get_constraint(&package.id) {
			if !pin.satisfies(&package.version) {
				return Err(ResolutionError::UnresolvedDependency {
					dependency: PackageDependency::new(package.id.clone(), Some(pin.clone())).to_string(),
					constraint: Some(pin.to_string()),
					constraint_source: Some(self.constraints.source().to_string()).filter(|s| !s.is_empty()),
				})
			}
		}

		let installed = self.local.find_packages(&package.id);
		if installed.iter().any(|p| p.version == package.version) {
			/* Already at the requested version */
			self.replacing.insert(key, package.identity());
			return Ok(Replacement { uninstalls: Vec::new(), installs: Vec::new() })
		}
		let old = installed.into_iter().last();

		self.replacing.insert(key, package.identity());

		let mut uninstalls = Vec::new();
		let mut installs = Vec::new();

		if let Some(old) = &old {
			/* Dependents of the outgoing version move first: their uninstalls
			 * precede ours, their installs follow ours. */
			for dependent in dependents.get_dependents(old) {
				if self.replacing.contains_key(&dependent.id.to_lowercase()) {
					continue
				}
				let declared = dependent.find_dependency(&package.id, self.target_framework.as_ref(), self.oracle);
				let satisfied = declared.map_or(true, |d| d.matches(&package.version));
				if satisfied {
					continue
				}

				let replacement = self.find_dependent_replacement(&dependent, package);
				match replacement {
					Some(replacement) if self.update_dependencies => {
						let moved = self.update_package(&replacement, dependents)?;
						uninstalls.extend(moved.uninstalls);
						installs.extend(moved.installs);
					}
					_ => {
						return Err(ResolutionError::UpdateConflict {
							old: old.identity(),
							new: package.identity(),
							dependent: dependent.id.clone(),
						})
					}
				}
			}

			uninstalls.push(PackageOperation::new(old.clone(), PackageAction::Uninstall));
		}

		/* Now the incoming version's own requirements */
		let dependencies: Vec<PackageDependency> = package
			.dependencies_for(self.target_framework.as_ref(), self.oracle)
			.into_iter()
			.cloned()
			.collect();

		let mut dependency_installs = Vec::new();
		for dependency in dependencies {
			if let Some(target) = self.replacing.get(&dependency.id.to_lowercase()) {
				if dependency.matches(&target.version) {
					continue
				}
				return Err(ResolutionError::UnresolvedDependency {
					dependency: dependency.to_string(),
					constraint: None,
					constraint_source: None,
				})
			}

			if self.local.find_packages(&dependency.id).iter().any(|p| dependency.matches(&p.version)) {
				continue
			}

			if !self.update_dependencies {
				return Err(ResolutionError::UnresolvedDependency {
					dependency: dependency.to_string(),
					constraint: None,
					constraint_source: None,
				})
			}

			let candidate = dependency_resolver::resolve_dependency(
				self.source,
				&dependency,
				Some(self.constraints),
				self.allow_prerelease,
				true,
				self.dependency_version,
			)?;
			let moved = self.update_package(&candidate, dependents)?;
			uninstalls.extend(moved.uninstalls);
			dependency_installs.extend(moved.installs);
		}

		/* Install order: our dependencies, then us, then our moved dependents */
		dependency_installs.push(PackageOperation::new(package.clone(), PackageAction::Install));
		dependency_installs.extend(installs);

		if let Some(old) = old {
			self.logger.log(MessageLevel::Info, &format!("updating '{}' to '{}'", old, package));
		}

		Ok(Replacement { uninstalls, installs: dependency_installs })
	}

	/// The highest source version of `dependent` that accepts `new` and every
	/// other filter; `None` when no version can live with the change.
	fn find_dependent_replacement(&self, dependent: &Package, new: &Package) -> Option<Arc<Package>> {
		let pin = self.constraints.get_constraint(&dependent.id);
		self.source.find_packages(&dependent.id)
			.into_iter()
			.filter(|p| p.version > dependent.version)
			.filter(|p| p.listed)
			.filter(|p| self.allow_prerelease || !p.version.is_prerelease())
			.filter(|p| pin.as_ref().map_or(true, |c| c.satisfies(&p.version)))
			.filter(|p| {
				p.find_dependency(&new.id, self.target_framework.as_ref(), self.oracle)
					.map_or(true, |d| d.matches(&new.version))
			})
			.last()
	}
}
