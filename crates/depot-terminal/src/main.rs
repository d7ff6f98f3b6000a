use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use depot::package::Package;
use depot::repository::InMemoryRepository;
use depot::repository::Repository;
use depot::repository::StandardLogger;
use depot::resolver::DependencyVersion;
use depot::resolver::InstallWalker;
use depot::resolver::UninstallWalker;
use depot::resolver::UpdateWalker;
use depot::PackageAction;
use depot::PackageOperation;

fn main() {
	env_logger::init();

	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",                   "Show help");
		opts.optopt(  "",  "installed",              "Path of the installed packages snapshot", "FILE");
		opts.optopt(  "",  "source",                 "Path of the source repository snapshot", "FILE");
		opts.optopt(  "",  "dependency-version",     "Dependency selection policy: lowest, highest-patch or highest", "POLICY");
		opts.optflag( "",  "prerelease",             "Allow prerelease versions");
		opts.optflag( "",  "ignore-dependencies",    "Install only the named packages");
		opts.optflag( "",  "remove-dependencies",    "Also uninstall dependencies nothing else needs");
		opts.optflag( "f", "force",                  "Uninstall even when other packages depend on it");
		opts.optflag( "",  "no-update-dependencies", "Fail updates that would touch other packages");
		opts.optflag( "y", "yes",                    "Apply without asking");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: depot [options] <install|uninstall|update|list> [PACKAGE [VERSION]]"));
			return;
		}

		parsed_options
	};

	let installed_path = parsed_options.opt_str("installed")
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from("installed.json"));

	let installed = match load_repository("installed", &installed_path, true) {
		Ok(r) => r,
		Err(e) => { log::error!("Failed to load installed snapshot: {}", e); return }
	};

	let Some(command) = parsed_options.free.first() else {
		eprintln!("{}", opts.usage("Usage: depot [options] <install|uninstall|update|list> [PACKAGE [VERSION]]"));
		return;
	};

	let result = match command.as_str() {
		"list" => list_packages(&installed),
		"install" => run_with_source(&parsed_options, installed, &installed_path, install_packages),
		"uninstall" => {
			let names = &parsed_options.free[1..];
			match uninstall_packages(&parsed_options, &installed, names) {
				Ok(ops) => apply(&parsed_options, installed, &installed_path, ops),
				Err(e) => Err(e),
			}
		}
		"update" => run_with_source(&parsed_options, installed, &installed_path, update_package),
		_ => { log::error!("Unknown command '{}'.", command); return }
	};

	if let Err(e) = result {
		log::error!("{}", e);
	}
}

fn load_repository(name: &str, path: &Path, tolerate_missing: bool) -> Result<InMemoryRepository, Error> {
	match std::fs::File::open(path) {
		Ok(file) => Ok(InMemoryRepository::read_from_json(name, file)?),
		Err(e) if tolerate_missing && e.kind() == std::io::ErrorKind::NotFound => {
			log::warn!("Snapshot '{}' not found, starting empty.", path.display());
			Ok(InMemoryRepository::new(name))
		}
		Err(e) => Err(Error::Depot(depot::Error::IO(e))),
	}
}

fn run_with_source(
	options: &getopts::Matches,
	installed: InMemoryRepository,
	installed_path: &Path,
	command: fn(&getopts::Matches, &InMemoryRepository, &InMemoryRepository, &[String]) -> Result<Vec<PackageOperation>, Error>,
) -> Result<(), Error> {
	let Some(source_path) = options.opt_str("source").map(PathBuf::from) else {
		return Err(Error::MissingArgument("--source"));
	};
	let source = load_repository("source", &source_path, false)?;
	let operations = command(options, &installed, &source, &options.free[1..])?;
	apply(options, installed, installed_path, operations)
}

fn dependency_version(options: &getopts::Matches) -> Result<DependencyVersion, Error> {
	match options.opt_str("dependency-version").as_deref() {
		None | Some("lowest") => Ok(DependencyVersion::Lowest),
		Some("highest-patch") => Ok(DependencyVersion::HighestPatch),
		Some("highest") => Ok(DependencyVersion::Highest),
		Some(other) => Err(Error::InvalidArgument(format!("unknown dependency selection policy '{}'", other))),
	}
}

/// Finds the requested package in `repository`: highest version when no
/// version argument was given.
fn find_requested(repository: &dyn Repository, names: &[String]) -> Result<Arc<Package>, Error> {
	let Some(id) = names.first() else {
		return Err(Error::MissingArgument("PACKAGE"));
	};

	let candidates = repository.find_packages(id);
	match names.get(1) {
		Some(version) => {
			let version = depot::SemanticVersion::parse(version)?;
			candidates.into_iter()
				.find(|p| p.version == version)
				.ok_or_else(|| Error::PackageNotFound(format!("{} {}", id, version)))
		}
		None => candidates.into_iter()
			.last()
			.ok_or_else(|| Error::PackageNotFound(id.clone())),
	}
}

fn list_packages(installed: &InMemoryRepository) -> Result<(), Error> {
	for package in installed.get_packages() {
		println!("{}", package);
	}
	Ok(())
}

fn install_packages(
	options: &getopts::Matches,
	installed: &InMemoryRepository,
	source: &InMemoryRepository,
	names: &[String],
) -> Result<Vec<PackageOperation>, Error> {
	if names.is_empty() {
		return Err(Error::MissingArgument("PACKAGE"));
	}

	let mut walker = InstallWalker::new(installed, source)
		.logger(&StandardLogger)
		.dependency_version(dependency_version(options)?)
		.allow_prerelease(options.opt_present("prerelease"))
		.ignore_dependencies(options.opt_present("ignore-dependencies"));

	/* Several packages resolve as one batch so shared dependencies appear once */
	let mut roots: Vec<Arc<Package>> = Vec::new();
	for id in names {
		let root = source.find_packages(id)
			.into_iter()
			.last()
			.ok_or_else(|| Error::PackageNotFound(id.clone()))?;
		roots.push(root);
	}

	let (operations, _) = walker.resolve_operations_many(&roots).map_err(depot::Error::from)?;
	Ok(operations)
}

fn uninstall_packages(
	options: &getopts::Matches,
	installed: &InMemoryRepository,
	names: &[String],
) -> Result<Vec<PackageOperation>, Error> {
	let root = find_requested(installed, names)?;
	let mut walker = UninstallWalker::new(installed)
		.logger(&StandardLogger)
		.remove_dependencies(options.opt_present("remove-dependencies"))
		.force_remove(options.opt_present("force"));
	Ok(walker.resolve_operations(root).map_err(depot::Error::from)?)
}

fn update_package(
	options: &getopts::Matches,
	installed: &InMemoryRepository,
	source: &InMemoryRepository,
	names: &[String],
) -> Result<Vec<PackageOperation>, Error> {
	let target = find_requested(source, names)?;
	let mut walker = UpdateWalker::new(installed, source)
		.logger(&StandardLogger)
		.dependency_version(dependency_version(options)?)
		.allow_prerelease(options.opt_present("prerelease"))
		.update_dependencies(!options.opt_present("no-update-dependencies"));
	Ok(walker.resolve_operations(target).map_err(depot::Error::from)?)
}

/// Shows the plan, asks for confirmation and writes the mutated installed
/// snapshot back to disk.
fn apply(
	options: &getopts::Matches,
	mut installed: InMemoryRepository,
	installed_path: &Path,
	operations: Vec<PackageOperation>,
) -> Result<(), Error> {
	if operations.is_empty() {
		println!("Nothing to do.");
		return Ok(())
	}

	println!("The following operations will be applied:");
	for operation in &operations {
		println!("\t{}", operation);
	}

	if !options.opt_present("yes") {
		let stdin = std::io::stdin();
		print!("Commit changes? [(y)/n] ");
		let _ = std::io::stdout().flush();
		loop {
			let mut input = String::new();
			let _ = stdin.read_line(&mut input);
			let input = input.trim().to_lowercase();
			if input == "y" || input.is_empty() {
				break;
			} else if input == "n" {
				return Err(Error::UserCancelled);
			} else {
				println!("\nInput invalid.")
			}
		}
	}

	for operation in &operations {
		match operation.action {
			PackageAction::Install => installed.add_package((*operation.package).clone()),
			PackageAction::Uninstall => { installed.remove_package(&operation.identity()); }
		}
	}

	installed.write_to_json(std::fs::File::create(installed_path).map_err(depot::Error::from)?).map_err(Error::Depot)?;
	log::info!("Applied {} operations.", operations.len());
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("depot error: {0}")]
	Depot(#[from] depot::Error),
	#[error("Missing argument {0}")]
	MissingArgument(&'static str),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Package '{0}' not found")]
	PackageNotFound(String),
	#[error("User cancelled an action")]
	UserCancelled,
}
