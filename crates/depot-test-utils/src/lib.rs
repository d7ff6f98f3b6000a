//! Various helper functions for testing
//!
//! Builders and fixtures shared by the integration tests so scenario setup
//! stays short.

use std::sync::Arc;

use depot::package::DependencySet;
use depot::package::FrameworkName;
use depot::package::Package;
use depot::package::PackageDependency;
use depot::package::SemanticVersion;
use depot::package::VersionSpec;
use depot::repository::InMemoryRepository;
use depot::repository::Repository;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("depot error: {0}")]
	Depot(#[from] depot::Error),
}

/// Parses a version literal. Panics on bad input, tests only ever feed it
/// literals.
pub fn version(s: &str) -> SemanticVersion {
	SemanticVersion::parse(s).unwrap_or_else(|_| panic!("invalid version literal '{}'", s))
}

pub fn spec(s: &str) -> VersionSpec {
	VersionSpec::parse(s).unwrap_or_else(|_| panic!("invalid version spec literal '{}'", s))
}

/// Fluent package construction for scenarios.
///
/// ```
/// use depot_test_utils::PackageBuilder;
/// let p = PackageBuilder::new("A", "1.0")
/// 	.assembly()
/// 	.depends_on("B", Some("[1.0,2.0)"))
/// 	.build();
/// assert_eq!(p.to_string(), "A 1.0");
/// ```
pub struct PackageBuilder {
	package: Package,
	dependencies: Vec<(Option<FrameworkName>, PackageDependency)>,
}

impl PackageBuilder {
	pub fn new(id: &str, version_literal: &str) -> Self {
		PackageBuilder {
			package: Package::new(id, version(version_literal)),
			dependencies: Vec::new(),
		}
	}

	/// Gives the package an assembly reference, making it project targeting.
	pub fn assembly(mut self) -> Self {
		self.package.assembly_references.push(format!("{}.dll", self.package.id));
		self
	}

	pub fn content(mut self, path: &str) -> Self {
		self.package.content_files.push(path.to_string());
		self
	}

	/// Gives the package a tool file, making it external.
	pub fn tool(mut self) -> Self {
		self.package.tools.push("init.ps1".to_string());
		self
	}

	pub fn listed(mut self, listed: bool) -> Self {
		self.package.listed = listed;
		self
	}

	pub fn min_client_version(mut self, version_literal: &str) -> Self {
		self.package.min_client_version = Some(version(version_literal));
		self
	}

	pub fn depends_on(mut self, id: &str, range: Option<&str>) -> Self {
		self.dependencies.push((None, PackageDependency::new(id, range.map(spec))));
		self
	}

	/// A dependency that only applies when the named framework is targeted.
	pub fn depends_on_for(mut self, framework: FrameworkName, id: &str, range: Option<&str>) -> Self {
		self.dependencies.push((Some(framework), PackageDependency::new(id, range.map(spec))));
		self
	}

	pub fn build(mut self) -> Package {
		for (framework, dependency) in self.dependencies {
			let set = self.package.dependency_sets.iter_mut().find(|s| s.target_framework == framework);
			match set {
				Some(set) => set.dependencies.push(dependency),
				None => self.package.dependency_sets.push(DependencySet {
					target_framework: framework,
					dependencies: vec![dependency],
				}),
			}
		}
		self.package
	}

	pub fn build_arc(self) -> Arc<Package> {
		Arc::new(self.build())
	}
}

/// An in-memory repository holding the given packages.
pub fn repository(source: &str, packages: Vec<Package>) -> InMemoryRepository {
	InMemoryRepository::with_packages(source, packages)
}

/// Writes the repository to a JSON snapshot in a temporary directory and
/// reads it back, returning both so callers can compare or keep the tempdir
/// alive.
pub fn json_round_trip(repository: &InMemoryRepository) -> Result<(InMemoryRepository, tempfile::TempDir), FixtureError> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("packages.json");
	repository.write_to_json(std::fs::File::create(&path)?)?;
	let restored = InMemoryRepository::read_from_json(repository.source(), std::fs::File::open(&path)?)?;
	Ok((restored, dir))
}
