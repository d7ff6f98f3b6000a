pub mod error;
pub use error::Result;
pub use error::Error;

pub mod package;
pub use package::Package;
pub use package::PackageIdentity;
pub use package::SemanticVersion;
pub use package::VersionSpec;

pub mod repository;
pub use repository::Repository;
pub use repository::InMemoryRepository;

pub mod resolver;
pub use resolver::PackageOperation;
pub use resolver::PackageAction;

/// The version of this engine, checked against package `min_client_version` requirements.
pub fn client_version() -> SemanticVersion {
	SemanticVersion::parse(env!("CARGO_PKG_VERSION")).expect("crate version is a valid semantic version")
}
