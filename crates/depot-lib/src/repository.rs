//! Package stores and the other collaborators the resolver consults.
//!
//! The installed repository and the source repository are distinct instances
//! with the same query contract. The resolver only reads; mutation is the
//! host's business between resolve calls.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::package::Package;
use crate::package::PackageIdentity;
use crate::package::SemanticVersion;
use crate::package::VersionSpec;

pub trait Repository {
	/// Human readable name used in log and error messages.
	fn source(&self) -> &str;

	fn get_packages(&self) -> Vec<Arc<Package>>;

	/// Every version of `id`, matched ignoring case, sorted ascending by version.
	fn find_packages(&self, id: &str) -> Vec<Arc<Package>>;

	fn find_package(&self, id: &str, version: &SemanticVersion) -> Option<Arc<Package>> {
		self.find_packages(id).into_iter().find(|p| &p.version == version)
	}

	fn exists(&self, id: &str, version: &SemanticVersion) -> bool {
		self.find_package(id, version).is_some()
	}
}

/// A repository held entirely in memory, indexed by lowercased id.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
	source: String,
	packages: BTreeMap<String, Vec<Arc<Package>>>,
}

impl InMemoryRepository {
	pub fn new(source: impl Into<String>) -> Self {
		InMemoryRepository { source: source.into(), packages: Default::default() }
	}

	pub fn with_packages(source: impl Into<String>, packages: impl IntoIterator<Item = Package>) -> Self {
		let mut repository = Self::new(source);
		for package in packages {
			repository.add_package(package);
		}
		repository
	}

	/// Adds or replaces the package with the same identity.
	pub fn add_package(&mut self, package: Package) {
		let versions = self.packages.entry(package.id.to_lowercase()).or_default();
		versions.retain(|p| p.version != package.version);
		versions.push(Arc::new(package));
		versions.sort_by(|a, b| a.version.cmp(&b.version));
	}

	pub fn remove_package(&mut self, identity: &PackageIdentity) -> bool {
		let key = identity.id.to_lowercase();
		let Some(versions) = self.packages.get_mut(&key) else { return false };
		let before = versions.len();
		versions.retain(|p| p.version != identity.version);
		let removed = versions.len() != before;
		if versions.is_empty() {
			self.packages.remove(&key);
		}
		removed
	}

	/// Loads a repository snapshot: a JSON array of packages.
	pub fn read_from_json(source: impl Into<String>, reader: impl std::io::Read) -> crate::Result<Self> {
		let packages: Vec<Package> = serde_json::from_reader(reader)?;
		Ok(Self::with_packages(source, packages))
	}

	pub fn write_to_json(&self, writer: impl std::io::Write) -> crate::Result<()> {
		let packages: Vec<&Package> = self.packages.values().flatten().map(|p| p.as_ref()).collect();
		serde_json::to_writer_pretty(writer, &packages)?;
		Ok(())
	}
}

impl Repository for InMemoryRepository {
	fn source(&self) -> &str {
		&self.source
	}

	fn get_packages(&self) -> Vec<Arc<Package>> {
		self.packages.values().flatten().cloned().collect()
	}

	fn find_packages(&self, id: &str) -> Vec<Arc<Package>> {
		self.packages.get(&id.to_lowercase()).map(|v| v.clone()).unwrap_or_default()
	}
}

/// Supplies externally pinned version ranges, e.g. from a host configuration
/// file. A pinned range a candidate fails is a hard failure for that
/// candidate.
pub trait ConstraintProvider {
	fn get_constraint(&self, id: &str) -> Option<VersionSpec>;

	/// Where the pins come from, for error messages.
	fn source(&self) -> &str;
}

/// Pins nothing.
pub struct NullConstraintProvider;

impl ConstraintProvider for NullConstraintProvider {
	fn get_constraint(&self, _id: &str) -> Option<VersionSpec> {
		None
	}

	fn source(&self) -> &str {
		""
	}
}

/// Constraints held in a map, keyed by lowercased id.
pub struct MapConstraintProvider {
	source: String,
	constraints: HashMap<String, VersionSpec>,
}

impl MapConstraintProvider {
	pub fn new(source: impl Into<String>) -> Self {
		MapConstraintProvider { source: source.into(), constraints: Default::default() }
	}

	pub fn pin(&mut self, id: &str, spec: VersionSpec) {
		self.constraints.insert(id.to_lowercase(), spec);
	}
}

impl ConstraintProvider for MapConstraintProvider {
	fn get_constraint(&self, id: &str) -> Option<VersionSpec> {
		self.constraints.get(&id.to_lowercase()).cloned()
	}

	fn source(&self) -> &str {
		&self.source
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
	Debug,
	Info,
	Warning,
}

/// How the host wants a file conflict handled. Consumed by the excluded
/// file-layer collaborators, carried through here so walkers can surface
/// conflicts without owning the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileConflictResolution {
	Overwrite,
	OverwriteAll,
	Ignore,
	IgnoreAll,
}

pub trait Logger {
	fn log(&self, level: MessageLevel, message: &str);

	fn resolve_file_conflict(&self, _message: &str) -> FileConflictResolution {
		FileConflictResolution::Ignore
	}
}

/// Discards everything.
pub struct NullLogger;

impl Logger for NullLogger {
	fn log(&self, _level: MessageLevel, _message: &str) {}
}

/// Forwards to the `log` facade.
pub struct StandardLogger;

impl Logger for StandardLogger {
	fn log(&self, level: MessageLevel, message: &str) {
		match level {
			MessageLevel::Debug => log::debug!("{}", message),
			MessageLevel::Info => log::info!("{}", message),
			MessageLevel::Warning => log::warn!("{}", message),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn v(s: &str) -> SemanticVersion { SemanticVersion::parse(s).unwrap() }

	fn repo() -> InMemoryRepository {
		InMemoryRepository::with_packages("test", vec![
			Package::new("Alpha", v("1.1")),
			Package::new("Alpha", v("1.0")),
			Package::new("Beta", v("2.0")),
		])
	}

	#[test] fn repository_lookup_ignores_case() { assert_eq!(repo().find_packages("ALPHA").len(), 2) }
	#[test] fn repository_versions_sorted_ascending() { assert_eq!(repo().find_packages("Alpha")[0].version, v("1.0")) }
	#[test] fn repository_exists_checks_exact_version() { assert!(repo().exists("beta", &v("2.0")) && !repo().exists("beta", &v("1.0"))) }
	#[test] fn repository_add_replaces_same_identity() {
		let mut r = repo();
		let mut p = Package::new("alpha", v("1.0"));
		p.listed = false;
		r.add_package(p);
		assert_eq!(r.find_packages("Alpha").len(), 2);
		assert!(!r.find_packages("Alpha")[0].listed);
	}
	#[test] fn repository_remove_drops_only_named_version() {
		let mut r = repo();
		assert!(r.remove_package(&PackageIdentity::new("alpha", v("1.0"))));
		assert_eq!(r.find_packages("Alpha").len(), 1);
		assert!(!r.remove_package(&PackageIdentity::new("alpha", v("1.0"))));
	}

	#[test]
	fn repository_json_round_trip() {
		let mut buffer = Vec::new();
		repo().write_to_json(&mut buffer).unwrap();
		let loaded = InMemoryRepository::read_from_json("test", buffer.as_slice()).unwrap();
		assert_eq!(loaded.get_packages().len(), 3);
		assert!(loaded.exists("Alpha", &v("1.1")));
	}
}
