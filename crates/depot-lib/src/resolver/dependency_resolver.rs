//! Picks the single best candidate for one dependency constraint.

use std::sync::Arc;

use crate::package::Package;
use crate::package::PackageDependency;
use crate::package::VersionSpec;
use crate::repository::ConstraintProvider;
use crate::repository::Repository;

use super::ResolutionError;

/// Which of the satisfying versions to take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyVersion {
	/// The smallest satisfying version. Default, keeps installs conservative.
	#[default]
	Lowest,
	/// The highest patch/revision within the lowest satisfying (major, minor) group.
	HighestPatch,
	/// The largest satisfying version.
	Highest,
}

/// All versions of the dependency's id that pass the filters, ascending.
///
/// Unlisted candidates survive only when no listed candidate satisfies the
/// constraint, and pre-release versions only when explicitly allowed.
pub fn find_candidates(
	repository: &dyn Repository,
	dependency: &PackageDependency,
	constraint: Option<&VersionSpec>,
	allow_prerelease: bool,
	prefer_listed: bool,
) -> Vec<Arc<Package>> {
	let mut candidates: Vec<Arc<Package>> = repository.find_packages(&dependency.id)
		.into_iter()
		.filter(|p| dependency.matches(&p.version))
		.filter(|p| constraint.map_or(true, |c| c.satisfies(&p.version)))
		.filter(|p| allow_prerelease || !p.version.is_prerelease())
		.collect();

	if prefer_listed && candidates.iter().any(|p| p.listed) {
		candidates.retain(|p| p.listed);
	}

	candidates
}

fn select_by_policy(candidates: Vec<Arc<Package>>, policy: DependencyVersion) -> Option<Arc<Package>> {
	match policy {
		DependencyVersion::Lowest => candidates.into_iter().next(),
		DependencyVersion::Highest => candidates.into_iter().last(),
		DependencyVersion::HighestPatch => {
			let lowest = candidates.first()?;
			let group = (lowest.version.major(), lowest.version.minor());
			candidates.iter()
				.take_while(|p| (p.version.major(), p.version.minor()) == group)
				.last()
				.cloned()
		}
	}
}

/// Resolves one dependency against `repository`: filter by range, pinned
/// constraint, pre-release and listing, then select by `policy`. No survivor
/// is an [`ResolutionError::UnresolvedDependency`].
pub fn resolve_dependency(
	repository: &dyn Repository,
	dependency: &PackageDependency,
	constraints: Option<&dyn ConstraintProvider>,
	allow_prerelease: bool,
	prefer_listed: bool,
	policy: DependencyVersion,
) -> Result<Arc<Package>, ResolutionError> {
	let constraint = constraints.and_then(|c| c.get_constraint(&dependency.id));

	let candidates = find_candidates(repository, dependency, constraint.as_ref(), allow_prerelease, prefer_listed);

	select_by_policy(candidates, policy).ok_or_else(|| ResolutionError::UnresolvedDependency {
		dependency: dependency.to_string(),
		constraint: constraint.as_ref().map(|c| c.to_string()),
		constraint_source: constraints
			.map(|c| c.source().to_string())
			.filter(|s| !s.is_empty()),
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::package::SemanticVersion;
	use crate::repository::InMemoryRepository;
	use crate::repository::MapConstraintProvider;

	fn v(s: &str) -> SemanticVersion { SemanticVersion::parse(s).unwrap() }

	fn repo(versions: &[&str]) -> InMemoryRepository {
		InMemoryRepository::with_packages("source", versions.iter().map(|s| Package::new("B", v(s))))
	}

	fn dep(spec: &str) -> PackageDependency {
		PackageDependency::new("B", Some(VersionSpec::parse(spec).unwrap()))
	}

	#[test]
	fn lowest_policy_takes_smallest_satisfying() {
		let r = repo(&["0.9", "1.0", "1.5", "2.0"]);
		let p = resolve_dependency(&r, &dep("1.0"), None, false, true, DependencyVersion::Lowest).unwrap();
		assert_eq!(p.version, v("1.0"));
	}

	#[test]
	fn highest_policy_takes_largest_satisfying() {
		let r = repo(&["0.9", "1.0", "1.5", "2.0"]);
		let p = resolve_dependency(&r, &dep("1.0"), None, false, true, DependencyVersion::Highest).unwrap();
		assert_eq!(p.version, v("2.0"));
	}

	#[test]
	fn highest_patch_stays_in_lowest_major_minor_group() {
		let r = repo(&["1.0", "1.0.1", "1.0.9", "1.1", "2.0"]);
		let p = resolve_dependency(&r, &dep("1.0"), None, false, true, DependencyVersion::HighestPatch).unwrap();
		assert_eq!(p.version, v("1.0.9"));
	}

	#[test]
	fn unlisted_versions_lose_to_listed_ones() {
		let mut r = repo(&["1.0"]);
		let mut unlisted = Package::new("B", v("1.5"));
		unlisted.listed = false;
		r.add_package(unlisted);
		let p = resolve_dependency(&r, &dep("1.0"), None, false, true, DependencyVersion::Highest).unwrap();
		assert_eq!(p.version, v("1.0"));
	}

	#[test]
	fn unlisted_version_used_when_nothing_listed_satisfies() {
		let mut r = InMemoryRepository::new("source");
		let mut unlisted = Package::new("B", v("2.0"));
		unlisted.listed = false;
		r.add_package(unlisted);
		r.add_package(Package::new("B", v("1.0")));
		let p = resolve_dependency(&r, &dep("2.0"), None, false, true, DependencyVersion::Lowest).unwrap();
		assert_eq!(p.version, v("2.0"));
	}

	#[test]
	fn prerelease_excluded_unless_allowed() {
		let r = repo(&["1.0-beta"]);
		assert!(resolve_dependency(&r, &dep("1.0-alpha"), None, false, true, DependencyVersion::Lowest).is_err());
		let p = resolve_dependency(&r, &dep("1.0-alpha"), None, true, true, DependencyVersion::Lowest).unwrap();
		assert_eq!(p.version, v("1.0-beta"));
	}

	#[test]
	fn pinned_constraint_is_a_hard_failure() {
		let r = repo(&["1.0", "2.0"]);
		let mut pins = MapConstraintProvider::new("packages.lock");
		pins.pin("B", VersionSpec::parse("[1.0]").unwrap());

		let p = resolve_dependency(&r, &dep("1.0"), Some(&pins), false, true, DependencyVersion::Highest).unwrap();
		assert_eq!(p.version, v("1.0"));

		let err = resolve_dependency(&r, &dep("2.0"), Some(&pins), false, true, DependencyVersion::Lowest).unwrap_err();
		assert!(matches!(&err, ResolutionError::UnresolvedDependency { constraint_source: Some(s), .. } if s == "packages.lock"));
		assert_eq!(err.to_string(), "Unable to resolve dependency 'B (≥ 2.0)'. The version is additionally constrained to (= 1.0) defined in packages.lock.");
	}

	#[test]
	fn missing_id_reports_range_notation() {
		let r = InMemoryRepository::new("source");
		let err = resolve_dependency(&r, &dep("[1.5]"), None, false, true, DependencyVersion::Lowest).unwrap_err();
		assert_eq!(err.to_string(), "Unable to resolve dependency 'B (= 1.5)'.");
	}
}
