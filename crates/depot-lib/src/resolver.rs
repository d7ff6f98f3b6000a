//! Walkers that turn package requests into ordered, conflict free operation lists.
//!
//! # Usage
//! 1. Build the walker for the request: [`InstallWalker`] to add a package,
//! [`UninstallWalker`] to remove one, [`UpdateWalker`] to replace an installed
//! version.
//! 1. Configure it with the builder setters (constraint provider, logger,
//! target framework, selection policy).
//! 1. Call `resolve_operations` with the root package to get the ordered
//! [`PackageOperation`] list, dependencies always ahead of their dependents
//! for installs and behind them for uninstalls.
//! 1. For several requests at once, feed them through [`ActionResolver`] which
//! merges the per-root lists and drops operations that cancel out.
//!
//! Walker state lives for a single `resolve_operations` call; nothing is
//! cached across calls.

use thiserror::Error;

use crate::package::PackageIdentity;
use crate::package::SemanticVersion;

mod dependency_resolver;
pub use dependency_resolver::DependencyVersion;
pub use dependency_resolver::resolve_dependency;
pub use dependency_resolver::find_candidates;

mod walker;

mod dependents;
pub use dependents::DependentsWalker;

mod install_walker;
pub use install_walker::InstallWalker;

mod uninstall_walker;
pub use uninstall_walker::UninstallWalker;

mod update_walker;
pub use update_walker::UpdateWalker;

mod action_resolver;
pub use action_resolver::ActionResolver;
pub use action_resolver::ResolveRequest;

/// These errors end the resolve call that raised them; nothing is retried.
#[derive(Debug, Error)]
pub enum ResolutionError {
	/// No candidate package satisfies the dependency and every pinned constraint.
	#[error("Unable to resolve dependency '{dependency}'.{}", pin_note(.constraint, .constraint_source))]
	UnresolvedDependency {
		/// The dependency in human readable range notation, e.g. `B (≥ 1.5)`.
		dependency: String,
		constraint: Option<String>,
		constraint_source: Option<String>,
	},

	/// A package id re-entered the active dependency chain.
	#[error("Circular dependency detected '{}'.", identity_chain(.chain))]
	CircularDependency { chain: Vec<PackageIdentity> },

	/// A dependency-only package pulls in both project-targeting and external packages.
	#[error("Child dependencies of dependency-only package '{package}' cannot mix packages that target projects with external packages.")]
	MixedDependencyTargets { package: PackageIdentity },

	#[error("External packages cannot depend on packages that target projects. '{package}' depends on '{dependency}'.")]
	InvalidDependencyTarget { package: PackageIdentity, dependency: PackageIdentity },

	/// Uninstall refused because another installed package still needs this one.
	#[error("Unable to uninstall '{package}' because {} on it.", dependent_phrase(.dependents))]
	PackageInUse { package: PackageIdentity, dependents: Vec<PackageIdentity> },

	/// A dependent of the old version cannot live with the new one.
	#[error("Updating '{old}' to '{new}' failed. Unable to find a version of '{dependent}' that is compatible with '{new}'.")]
	UpdateConflict { old: PackageIdentity, new: PackageIdentity, dependent: String },

	#[error("The '{package}' package requires client version '{required}' or above, but the current version is '{current}'.")]
	ClientVersionTooLow { package: PackageIdentity, required: SemanticVersion, current: SemanticVersion },

	#[error("Unable to find package '{id}'{}.", version_note(.version))]
	PackageNotFound { id: String, version: Option<SemanticVersion> },
}

fn identity_chain(chain: &[PackageIdentity]) -> String {
	chain.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" => ")
}

fn dependent_phrase(dependents: &[PackageIdentity]) -> String {
	let quoted: Vec<String> = dependents.iter().map(|i| format!("'{}'", i)).collect();
	if quoted.len() == 1 {
		format!("{} depends", quoted[0])
	} else {
		format!("{} depend", quoted.join(", "))
	}
}

fn pin_note(constraint: &Option<String>, source: &Option<String>) -> String {
	match (constraint, source) {
		(Some(c), Some(s)) => format!(" The version is additionally constrained to ({}) defined in {}.", c, s),
		(Some(c), None) => format!(" The version is additionally constrained to ({}).", c),
		_ => String::new(),
	}
}

fn version_note(version: &Option<SemanticVersion>) -> String {
	match version {
		Some(v) => format!(" version '{}'", v),
		None => String::new(),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageAction {
	Install,
	Uninstall,
}

impl std::fmt::Display for PackageAction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PackageAction::Install => write!(f, "Install"),
			PackageAction::Uninstall => write!(f, "Uninstall"),
		}
	}
}

/// One step of a resolved plan.
#[derive(Debug, Clone)]
pub struct PackageOperation {
	pub package: std::sync::Arc<crate::package::Package>,
	pub action: PackageAction,
}

impl PackageOperation {
	pub fn new(package: std::sync::Arc<crate::package::Package>, action: PackageAction) -> Self {
		PackageOperation { package, action }
	}

	pub fn identity(&self) -> PackageIdentity {
		self.package.identity()
	}

	pub(crate) fn key(&self) -> (crate::package::PackageKey, PackageAction) {
		(self.identity().key(), self.action)
	}
}

impl std::cmp::PartialEq for PackageOperation {
	fn eq(&self, other: &Self) -> bool {
		self.action == other.action && self.identity() == other.identity()
	}
}

impl std::cmp::Eq for PackageOperation {}

impl std::fmt::Display for PackageOperation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.action, self.package)
	}
}
