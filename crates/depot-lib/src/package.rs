//! Various types associated with packages.

use serde::{Serialize, Deserialize};

mod semantic_version;
pub use semantic_version::SemanticVersion;

mod version_spec;
pub use version_spec::VersionSpec;

pub mod framework;
pub use framework::FrameworkName;
pub use framework::FrameworkCompatibility;
pub use framework::DefaultFrameworkCompatibility;

/// A unique identifier for a package: id plus version.
///
/// Two identities are equal when the ids match ignoring case and the
/// versions compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
	pub id: String,
	pub version: SemanticVersion,
}

impl PackageIdentity {
	pub fn new(id: impl Into<String>, version: SemanticVersion) -> Self {
		PackageIdentity { id: id.into(), version }
	}

	pub(crate) fn key(&self) -> PackageKey {
		(self.id.to_lowercase(), self.version.clone())
	}
}

/// Lowercased id plus version, used for visited sets and dedup maps.
pub(crate) type PackageKey = (String, SemanticVersion);

impl std::cmp::PartialEq for PackageIdentity {
	fn eq(&self, other: &Self) -> bool {
		self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
	}
}

impl std::cmp::Eq for PackageIdentity {}

impl std::hash::Hash for PackageIdentity {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id.to_lowercase().hash(state);
		self.version.hash(state);
	}
}

impl std::cmp::Ord for PackageIdentity {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		match self.id.to_lowercase().cmp(&other.id.to_lowercase()) {
			std::cmp::Ordering::Equal => {}
			ord => return ord,
		}
		self.version.cmp(&other.version)
	}
}

impl std::cmp::PartialOrd for PackageIdentity {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Display for PackageIdentity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.id, self.version)
	}
}

/// A requirement on another package: its id and an optional version range.
/// A missing range accepts every version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDependency {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version_spec: Option<VersionSpec>,
}

impl PackageDependency {
	pub fn new(id: impl Into<String>, version_spec: Option<VersionSpec>) -> Self {
		PackageDependency { id: id.into(), version_spec }
	}

	pub fn matches(&self, version: &SemanticVersion) -> bool {
		match &self.version_spec {
			Some(spec) => spec.satisfies(version),
			None => true,
		}
	}
}

impl std::fmt::Display for PackageDependency {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.version_spec {
			Some(spec) => write!(f, "{} ({})", self.id, spec),
			None => write!(f, "{}", self.id),
		}
	}
}

/// Dependencies grouped by the framework they apply to. A set without a
/// target framework applies to any consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySet {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_framework: Option<FrameworkName>,
	#[serde(default)]
	pub dependencies: Vec<PackageDependency>,
}

/// What a package contributes to, derived from its content and its
/// dependency closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTargets {
	/// No content of any kind.
	None,
	/// Carries assemblies or content files for a consuming project.
	Project,
	/// Carries only solution-level tooling.
	External,
	/// Filter value accepting any classification.
	All,
}

impl PackageTargets {
	/// Whether a package classified `other` passes this filter.
	///
	/// `None`-classified packages pass every filter: a package with no
	/// content contributes nothing wherever it lands, so excluding it from a
	/// targeted bulk operation would only strand it at a stale version.
	pub fn accepts(&self, other: PackageTargets) -> bool {
		match self {
			PackageTargets::All => true,
			t => *t == other || other == PackageTargets::None,
		}
	}
}

/// Package metadata as the resolver sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
	pub id: String,
	pub version: SemanticVersion,
	#[serde(default)]
	pub dependency_sets: Vec<DependencySet>,
	#[serde(default)]
	pub assembly_references: Vec<String>,
	#[serde(default)]
	pub content_files: Vec<String>,
	#[serde(default)]
	pub tools: Vec<String>,
	/// Unlisted packages are skipped by open-ended resolution whenever a
	/// listed candidate satisfies, but still satisfy installed references.
	#[serde(default = "listed_default")]
	pub listed: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub min_client_version: Option<SemanticVersion>,
}

fn listed_default() -> bool { true }

impl Package {
	pub fn new(id: impl Into<String>, version: SemanticVersion) -> Self {
		Package {
			id: id.into(),
			version,
			dependency_sets: Default::default(),
			assembly_references: Default::default(),
			content_files: Default::default(),
			tools: Default::default(),
			listed: true,
			min_client_version: None,
		}
	}

	pub fn identity(&self) -> PackageIdentity {
		PackageIdentity::new(self.id.clone(), self.version.clone())
	}

	pub fn has_dependencies(&self) -> bool {
		self.dependency_sets.iter().any(|set| !set.dependencies.is_empty())
	}

	/// The dependencies that apply to a consumer on `framework`.
	///
	/// With no consumer framework every declared dependency applies. With
	/// one, the most specific compatible set wins (highest framework
	/// version, ties broken by narrower portable profiles), falling back to
	/// the framework-less sets. No compatible set contributes nothing.
	pub fn dependencies_for(
		&self,
		framework: Option<&FrameworkName>,
		oracle: &dyn FrameworkCompatibility,
	) -> Vec<&PackageDependency> {
		let project = match framework {
			Some(fw) => fw,
			None => {
				return self.dependency_sets.iter().flat_map(|set| set.dependencies.iter()).collect()
			}
		};

		let best = self.dependency_sets.iter()
			.filter(|set| {
				set.target_framework.as_ref().is_some_and(|fw| oracle.is_compatible(project, fw))
			})
			.max_by(|a, b| {
				let a = a.target_framework.as_ref().expect("filtered to framework-bearing sets");
				let b = b.target_framework.as_ref().expect("filtered to framework-bearing sets");
				a.version.cmp(&b.version)
					.then(b.profile_breadth().cmp(&a.profile_breadth()))
			});

		match best {
			Some(set) => set.dependencies.iter().collect(),
			None => self.dependency_sets.iter()
				.filter(|set| set.target_framework.is_none())
				.flat_map(|set| set.dependencies.iter())
				.collect(),
		}
	}

	pub fn find_dependency(
		&self,
		id: &str,
		framework: Option<&FrameworkName>,
		oracle: &dyn FrameworkCompatibility,
	) -> Option<&PackageDependency> {
		self.dependencies_for(framework, oracle)
			.into_iter()
			.find(|dep| dep.id.eq_ignore_ascii_case(id))
	}

	/// Classification from this package's own content, `None` when it must
	/// inherit from its dependency closure.
	pub fn own_targets(&self) -> Option<PackageTargets> {
		if !self.assembly_references.is_empty() || !self.content_files.is_empty() {
			Some(PackageTargets::Project)
		} else if !self.tools.is_empty() {
			Some(PackageTargets::External)
		} else if self.has_dependencies() {
			None
		} else {
			Some(PackageTargets::None)
		}
	}
}

impl std::hash::Hash for Package {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.identity().hash(state);
	}
}

impl std::cmp::PartialEq for Package {
	fn eq(&self, other: &Self) -> bool {
		self.identity() == other.identity()
	}
}

impl std::cmp::Eq for Package {}

impl std::cmp::Ord for Package {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.identity().cmp(&other.identity())
	}
}

impl std::cmp::PartialOrd for Package {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Display for Package {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.id, self.version)
	}
}
