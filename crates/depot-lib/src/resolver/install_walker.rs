//! Resolves the minimal ordered install set for one or more root packages.

use std::collections::HashSet;
use std::sync::Arc;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::DefaultFrameworkCompatibility;
use crate::package::Package;
use crate::package::PackageDependency;
use crate::package::PackageIdentity;
use crate::package::PackageKey;
use crate::package::SemanticVersion;
use crate::repository::ConstraintProvider;
use crate::repository::Logger;
use crate::repository::MessageLevel;
use crate::repository::NullConstraintProvider;
use crate::repository::NullLogger;
use crate::repository::Repository;

use super::dependency_resolver;
use super::dependency_resolver::DependencyVersion;
use super::walker;
use super::walker::WalkContext;
use super::walker::WalkStrategy;
use super::PackageAction;
use super::PackageOperation;
use super::ResolutionError;

/// Computes the installs needed to bring a package and its missing
/// dependencies into the installed repository.
///
/// Dependencies already satisfied by an installed version are left untouched
/// and their subtrees are not revisited. Operations come out in dependency
/// order: a package's installs always follow its dependencies' installs.
pub struct InstallWalker<'a> {
	local: &'a dyn Repository,
	source: &'a dyn Repository,
	constraints: &'a dyn ConstraintProvider,
	logger: &'a dyn Logger,
	oracle: &'a dyn FrameworkCompatibility,
	target_framework: Option<FrameworkName>,
	dependency_version: DependencyVersion,
	allow_prerelease: bool,
	ignore_dependencies: bool,
	client_version: SemanticVersion,

	operations: Vec<PackageOperation>,
	emitted: HashSet<PackageKey>,
	dependency_order: Vec<PackageIdentity>,
}

impl<'a> InstallWalker<'a> {
	pub fn new(local: &'a dyn Repository, source: &'a dyn Repository) -> Self {
		InstallWalker {
			local,
			source,
			constraints: &NullConstraintProvider,
			logger: &NullLogger,
			oracle: &DefaultFrameworkCompatibility,
			target_framework: None,
			dependency_version: Default::default(),
			allow_prerelease: false,
			ignore_dependencies: false,
			client_version: crate::client_version(),
			operations: Default::default(),
			emitted: Default::default(),
			dependency_order: Default::default(),
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

	pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
		self.ignore_dependencies = ignore;
		self
	}

	/// The ordered install list for a single root.
	pub fn resolve_operations(&mut self, package: Arc<Package>) -> Result<Vec<PackageOperation>, ResolutionError> {
		self.reset();
		let mut ctx = WalkContext::new();
		walker::walk(self, &mut ctx, &package)?;
		Ok(std::mem::take(&mut self.operations))
	}

	/// Resolves several roots into one merged, deduplicated operation list.
	///
	/// Also returns the roots reordered so that a root appearing in another
	/// root's dependency closure comes first.
	pub fn resolve_operations_many(
		&mut self,
		packages: &[Arc<Package>],
	) -> Result<(Vec<PackageOperation>, Vec<Arc<Package>>), ResolutionError> {
		self.reset();
		let mut ctx = WalkContext::new();
		for package in packages {
			walker::walk(self, &mut ctx, package)?;
		}

		let mut ordered: Vec<Arc<Package>> = packages.to_vec();
		let position = |p: &Arc<Package>| {
			self.dependency_order.iter()
				.position(|i| *i == p.identity())
				.unwrap_or(usize::MAX)
		};
		ordered.sort_by_key(position);

		Ok((std::mem::take(&mut self.operations), ordered))
	}

	fn reset(&mut self) {
		self.operations.clear();
		self.emitted.clear();
		self.dependency_order.clear();
	}
}

impl WalkStrategy for InstallWalker<'_> {
	fn target_framework(&self) -> Option<&FrameworkName> {
		self.target_framework.as_ref()
	}

	fn oracle(&self) -> &dyn FrameworkCompatibility {
		self.oracle
	}

	fn skip_dependencies(&self) -> bool {
		self.ignore_dependencies
	}

	fn before_walk(&mut self, package: &Arc<Package>) -> Result<(), ResolutionError> {
		/* Client requirements are checked per package as it is resolved,
		 * not just at the root. */
		if let Some(required) = &package.min_client_version {
			if required > &self.client_version {
				return Err(ResolutionError::ClientVersionTooLow {
					package: package.identity(),
					required: required.clone(),
					current: self.client_version.clone(),
				})
			}
		}
		Ok(())
	}

	fn resolve_dependency(
		&mut self,
		_package: &Package,
		dependency: &PackageDependency,
	) -> Result<Option<Arc<Package>>, ResolutionError> {
		/* An installed version that already satisfies stays as it is, even
		 * when the source holds something newer. */
		let installed = self.local.find_packages(&dependency.id)
			.into_iter()
			.filter(|p| dependency.matches(&p.version))
			.last();
		if let Some(installed) = installed {
			log::debug!("dependency '{}' already satisfied by installed package", dependency);
			/* Still counts for ordering: a satisfied root must precede its
			 * dependents in the multi-root result */
			self.dependency_order.push(installed.identity());
			return Ok(None)
		}

		dependency_resolver::resolve_dependency(
			self.source,
			dependency,
			Some(self.constraints),
			self.allow_prerelease,
			true,
			self.dependency_version,
		).map(Some)
	}

	fn after_walk(&mut self, package: &Arc<Package>) -> Result<(), ResolutionError> {
		let identity = package.identity();
		self.dependency_order.push(identity.clone());

		if !self.local.exists(&package.id, &package.version) && self.emitted.insert(identity.key()) {
			self.logger.log(MessageLevel::Info, &format!("resolved '{}' for install from '{}'", identity, self.source.source()));
			self.operations.push(PackageOperation::new(package.clone(), PackageAction::Install));
		}
		Ok(())
	}
}
