//! Target framework names and the compatibility oracle consulted when a
//! package partitions its dependencies into per-framework sets.

use serde::{Serialize, Deserialize};

use super::SemanticVersion;

/// A target framework a package asset or dependency set applies to.
///
/// Portable profiles list their member frameworks in `profile` joined
/// with `+`, e.g. `win+net45`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameworkName {
	pub identifier: String,
	pub version: SemanticVersion,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile: Option<String>,
}

impl FrameworkName {
	pub fn new(identifier: impl Into<String>, version: SemanticVersion) -> Self {
		FrameworkName { identifier: identifier.into(), version, profile: None }
	}

	pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
		self.profile = Some(profile.into());
		self
	}

	/// How many frameworks this name spans. Non-portable names span one.
	pub fn profile_breadth(&self) -> usize {
		self.profile.as_ref().map(|p| p.split('+').count()).unwrap_or(1)
	}
}

impl std::fmt::Display for FrameworkName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.identifier, self.version)?;
		if let Some(profile) = &self.profile {
			write!(f, " ({})", profile)?;
		}
		Ok(())
	}
}

/// Decides whether a package framework can serve a consuming project
/// framework. The full portable-profile scoring lives with the host; the
/// resolver only needs a yes/no answer and a specificity tie-break.
pub trait FrameworkCompatibility {
	fn is_compatible(&self, project: &FrameworkName, package: &FrameworkName) -> bool;
}

/// Same family, package version at or below the project version, and a
/// matching profile when the package declares one.
pub struct DefaultFrameworkCompatibility;

impl FrameworkCompatibility for DefaultFrameworkCompatibility {
	fn is_compatible(&self, project: &FrameworkName, package: &FrameworkName) -> bool {
		if !project.identifier.eq_ignore_ascii_case(&package.identifier) {
			return false
		}
		if package.version > project.version {
			return false
		}
		match (&project.profile, &package.profile) {
			(_, None) => true,
			/* A portable package serves any one of its member frameworks */
			(Some(p), Some(q)) => q.split('+').any(|member| member.eq_ignore_ascii_case(p)),
			(None, Some(_)) => false,
		}
	}
}
