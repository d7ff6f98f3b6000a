//! Resolves the ordered removal set for an installed package.

use std::collections::HashSet;
use std::sync::Arc;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::DefaultFrameworkCompatibility;
use crate::package::Package;
use crate::package::PackageDependency;
use crate::package::PackageKey;
use crate::repository::Logger;
use crate::repository::MessageLevel;
use crate::repository::NullLogger;
use crate::repository::Repository;

use super::dependents::DependentsWalker;
use super::walker;
use super::walker::WalkContext;
use super::walker::WalkStrategy;
use super::PackageAction;
use super::PackageOperation;
use super::ResolutionError;

/// Computes the uninstalls needed to remove a package, optionally taking its
/// no-longer-needed dependencies with it.
///
/// Operations come out dependents first: the root is removed before its
/// dependencies so the installed set stays self consistent at every step.
/// Dependencies missing from the installed repository are ignored; stale
/// bookkeeping must not block removal.
pub struct UninstallWalker<'a> {
	local: &'a dyn Repository,
	logger: &'a dyn Logger,
	oracle: &'a dyn FrameworkCompatibility,
	target_framework: Option<FrameworkName>,
	remove_dependencies: bool,
	force_remove: bool,

	operations: Vec<PackageOperation>,
	removing: HashSet<PackageKey>,
	dependents: Option<DependentsWalker>,
}

impl<'a> UninstallWalker<'a> {
	pub fn new(local: &'a dyn Repository) -> Self {
		UninstallWalker {
			local,
			logger: &NullLogger,
			oracle: &DefaultFrameworkCompatibility,
			target_framework: None,
			remove_dependencies: false,
			force_remove: false,
			operations: Default::default(),
			removing: Default::default(),
			dependents: None,
		}
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

	/// Also remove dependencies nothing else needs.
	pub fn remove_dependencies(mut self, remove: bool) -> Self {
		self.remove_dependencies = remove;
		self
	}

	/// Remove the root even when other installed packages depend on it.
	pub fn force_remove(mut self, force: bool) -> Self {
		self.force_remove = force;
		self
	}

	pub fn resolve_operations(&mut self, package: Arc<Package>) -> Result<Vec<PackageOperation>, ResolutionError> {
		self.operations.clear();
		self.removing.clear();

		if !self.local.exists(&package.id, &package.version) {
			return Err(ResolutionError::PackageNotFound {
				id: package.id.clone(),
				version: Some(package.version.clone()),
			})
		}

		/* Rebuilt every call; the index must not outlive the snapshot */
		let dependents = DependentsWalker::new(self.local, self.target_framework.as_ref(), self.oracle);

		if !self.force_remove {
			let blocking = dependents.get_dependents(&package);
			if !blocking.is_empty() {
				let mut identities: Vec<_> = blocking.iter().map(|p| p.identity()).collect();
				identities.sort();
				return Err(ResolutionError::PackageInUse { package: package.identity(), dependents: identities })
			}
		}

		self.dependents = Some(dependents);
		self.removing.insert(package.identity().key());

		let mut ctx = WalkContext::new();
		walker::walk(self, &mut ctx, &package)?;

		self.dependents = None;
		Ok(std::mem::take(&mut self.operations))
	}
}

impl WalkStrategy for UninstallWalker<'_> {
	fn target_framework(&self) -> Option<&FrameworkName> {
		self.target_framework.as_ref()
	}

	fn oracle(&self) -> &dyn FrameworkCompatibility {
		self.oracle
	}

	fn skip_dependencies(&self) -> bool {
		!self.remove_dependencies
	}

	fn enforce_targets(&self) -> bool {
		/* Whatever got installed must stay removable */
		false
	}

	fn before_walk(&mut self, package: &Arc<Package>) -> Result<(), ResolutionError> {
		/* Pre-order emission: dependents leave before their dependencies */
		self.operations.push(PackageOperation::new(package.clone(), PackageAction::Uninstall));
		Ok(())
	}

	fn resolve_dependency(
		&mut self,
		_package: &Package,
		dependency: &PackageDependency,
	) -> Result<Option<Arc<Package>>, ResolutionError> {
		let installed = self.local.find_packages(&dependency.id)
			.into_iter()
			.filter(|p| dependency.matches(&p.version))
			.last();

		let Some(installed) = installed else {
			log::debug!("dependency '{}' not installed, nothing to remove", dependency);
			return Ok(None)
		};

		if self.removing.contains(&installed.identity().key()) {
			return Ok(None)
		}

		let dependents = self.dependents.as_ref().expect("dependents index exists during a walk");
		let mut in_use: Vec<_> = dependents.get_dependents(&installed)
			.into_iter()
			.filter(|d| !self.removing.contains(&d.identity().key()))
			.map(|d| d.identity())
			.collect();

		if !in_use.is_empty() {
			/* Shared dependency: leave it behind, removal is simply partial */
			in_use.sort();
			let list: Vec<String> = in_use.iter().map(|i| format!("'{}'", i)).collect();
			self.logger.log(
				MessageLevel::Warning,
				&format!("'{}' was not uninstalled because {} still depends on it", installed, list.join(", ")),
			);
			return Ok(None)
		}

		self.removing.insert(installed.identity().key());
		Ok(Some(installed))
	}
}
