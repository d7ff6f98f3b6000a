//! Merges several install/uninstall requests into one operation list.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::package::FrameworkCompatibility;
use crate::package::FrameworkName;
use crate::package::DefaultFrameworkCompatibility;
use crate::package::Package;
use crate::package::PackageKey;
use crate::repository::ConstraintProvider;
use crate::repository::Logger;
use crate::repository::NullConstraintProvider;
use crate::repository::NullLogger;
use crate::repository::Repository;

use super::dependency_resolver::DependencyVersion;
use super::install_walker::InstallWalker;
use super::uninstall_walker::UninstallWalker;
use super::PackageAction;
use super::PackageOperation;
use super::ResolutionError;

/// One package request with its per-request switches.
#[derive(Clone)]
pub struct ResolveRequest {
	pub action: PackageAction,
	pub package: Arc<Package>,
	pub ignore_dependencies: bool,
	pub remove_dependencies: bool,
	pub force_remove: bool,
	pub allow_prerelease: bool,
}

impl ResolveRequest {
	pub fn install(package: Arc<Package>) -> Self {
		ResolveRequest {
			action: PackageAction::Install,
			package,
			ignore_dependencies: false,
			remove_dependencies: false,
			force_remove: false,
			allow_prerelease: false,
		}
	}

	pub fn uninstall(package: Arc<Package>) -> Self {
		ResolveRequest { action: PackageAction::Uninstall, ..ResolveRequest::install(package) }
	}

	pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
		self.ignore_dependencies = ignore;
		self
	}

	pub fn remove_dependencies(mut self, remove: bool) -> Self {
		self.remove_dependencies = remove;
		self
	}

	pub fn force_remove(mut self, force: bool) -> Self {
		self.force_remove = force;
		self
	}

	pub fn allow_prerelease(mut self, allow: bool) -> Self {
		self.allow_prerelease = allow;
		self
	}
}

/// Runs each request through the matching walker and merges the results.
///
/// The merged list keeps the first occurrence of a repeated operation and
/// drops install/uninstall pairs of the same identity, which cancel out.
pub struct ActionResolver<'a> {
	local: &'a dyn Repository,
	source: &'a dyn Repository,
	constraints: &'a dyn ConstraintProvider,
	logger: &'a dyn Logger,
	oracle: &'a dyn FrameworkCompatibility,
	target_framework: Option<FrameworkName>,
	dependency_version: DependencyVersion,
}

impl<'a> ActionResolver<'a> {
	pub fn new(local: &'a dyn Repository, source: &'a dyn Repository) -> Self {
		ActionResolver {
			local,
			source,
			constraints: &NullConstraintProvider,
			logger: &NullLogger,
			oracle: &DefaultFrameworkCompatibility,
			target_framework: None,
			dependency_version: Default::default(),
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

	pub fn resolve(&self, requests: &[ResolveRequest]) -> Result<Vec<PackageOperation>, ResolutionError> {
		let mut operations = Vec::new();
		for request in requests {
			operations.extend(self.resolve_request(request)?);
		}
		Ok(reduce(operations))
	}

	fn resolve_request(&self, request: &ResolveRequest) -> Result<Vec<PackageOperation>, ResolutionError> {
		match request.action {
			PackageAction::Install => {
				let mut walker = InstallWalker::new(self.local, self.source)
					.constraints(self.constraints)
					.logger(self.logger)
					.oracle(self.oracle)
					.dependency_version(self.dependency_version)
					.allow_prerelease(request.allow_prerelease)
					.ignore_dependencies(request.ignore_dependencies);
				if let Some(framework) = &self.target_framework {
					walker = walker.target_framework(framework.clone());
				}
				walker.resolve_operations(request.package.clone())
			}
			PackageAction::Uninstall => {
				let mut walker = UninstallWalker::new(self.local)
					.logger(self.logger)
					.oracle(self.oracle)
					.remove_dependencies(request.remove_dependencies)
					.force_remove(request.force_remove);
				if let Some(framework) = &self.target_framework {
					walker = walker.target_framework(framework.clone());
				}
				walker.resolve_operations(request.package.clone())
			}
		}
	}
}

/// Drops repeats (first occurrence wins) and install/uninstall pairs that
/// cancel each other out.
fn reduce(operations: Vec<PackageOperation>) -> Vec<PackageOperation> {
	let mut seen: HashSet<(PackageKey, PackageAction)> = HashSet::new();
	let operations: Vec<PackageOperation> = operations.into_iter()
		.filter(|op| seen.insert(op.key()))
		.collect();

	let mut actions: HashMap<PackageKey, HashSet<PackageAction>> = HashMap::new();
	for op in &operations {
		actions.entry(op.identity().key()).or_default().insert(op.action);
	}

	operations.into_iter()
		.filter(|op| actions[&op.identity().key()].len() == 1)
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::DependencySet;
	use crate::package::PackageDependency;
	use crate::package::SemanticVersion;
	use crate::package::VersionSpec;
	use crate::repository::InMemoryRepository;

	fn v(s: &str) -> SemanticVersion { SemanticVersion::parse(s).unwrap() }

	fn package(id: &str, version: &str, deps: &[(&str, Option<&str>)]) -> Package {
		let mut p = Package::new(id, v(version));
		p.assembly_references = vec![format!("{}.dll", id)];
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

	fn names(operations: &[PackageOperation]) -> Vec<String> {
		operations.iter().map(|o| o.to_string()).collect()
	}

	#[test]
	fn shared_dependency_installed_once_across_requests() {
		let local = InMemoryRepository::new("installed");
		let source = InMemoryRepository::with_packages("source", vec![
			package("A", "1.0", &[("Shared", None)]),
			package("B", "1.0", &[("Shared", None)]),
			package("Shared", "1.0", &[]),
		]);

		let a = source.find_package("A", &v("1.0")).unwrap();
		let b = source.find_package("B", &v("1.0")).unwrap();
		let ops = ActionResolver::new(&local, &source)
			.resolve(&[ResolveRequest::install(a), ResolveRequest::install(b)])
			.unwrap();
		assert_eq!(names(&ops), vec!["Install Shared 1.0", "Install A 1.0", "Install B 1.0"]);
	}

	#[test]
	fn repeated_operations_keep_the_first_occurrence() {
		let a = Arc::new(package("A", "1.0", &[]));
		let b = Arc::new(package("B", "1.0", &[]));
		let ops = reduce(vec![
			PackageOperation::new(a.clone(), PackageAction::Install),
			PackageOperation::new(b, PackageAction::Install),
			PackageOperation::new(a, PackageAction::Install),
		]);
		assert_eq!(names(&ops), vec!["Install A 1.0", "Install B 1.0"]);
	}

	#[test]
	fn install_uninstall_pair_of_same_identity_cancels_out() {
		let a = Arc::new(package("A", "1.0", &[]));
		let b = Arc::new(package("B", "1.0", &[]));
		let ops = reduce(vec![
			PackageOperation::new(a.clone(), PackageAction::Uninstall),
			PackageOperation::new(b, PackageAction::Install),
			PackageOperation::new(a, PackageAction::Install),
		]);
		assert_eq!(names(&ops), vec!["Install B 1.0"]);
	}

	#[test]
	fn different_versions_of_an_id_do_not_cancel() {
		let old = Arc::new(package("A", "1.0", &[]));
		let new = Arc::new(package("A", "2.0", &[]));
		let ops = reduce(vec![
			PackageOperation::new(old, PackageAction::Uninstall),
			PackageOperation::new(new, PackageAction::Install),
		]);
		assert_eq!(names(&ops), vec!["Uninstall A 1.0", "Install A 2.0"]);
	}

	#[test]
	fn per_request_switches_are_honored() {
		let local = InMemoryRepository::new("installed");
		let source = InMemoryRepository::with_packages("source", vec![
			package("A", "1.0", &[("B", None)]),
			package("B", "1.0", &[]),
		]);

		let a = source.find_package("A", &v("1.0")).unwrap();
		let ops = ActionResolver::new(&local, &source)
			.resolve(&[ResolveRequest::install(a).ignore_dependencies(true)])
			.unwrap();
		assert_eq!(names(&ops), vec!["Install A 1.0"]);
	}

	#[test]
	fn failing_request_fails_the_whole_batch() {
		let local = InMemoryRepository::new("installed");
		let source = InMemoryRepository::with_packages("source", vec![
			package("A", "1.0", &[("Missing", None)]),
			package("B", "1.0", &[]),
		]);

		let a = source.find_package("A", &v("1.0")).unwrap();
		let b = source.find_package("B", &v("1.0")).unwrap();
		let err = ActionResolver::new(&local, &source)
			.resolve(&[ResolveRequest::install(b), ResolveRequest::install(a)])
			.unwrap_err();
		assert!(matches!(err, ResolutionError::UnresolvedDependency { .. }));
	}
}
