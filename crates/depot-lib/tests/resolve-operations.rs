use std::sync::Arc;

use depot::package::FrameworkName;
use depot::repository::InMemoryRepository;
use depot::repository::MapConstraintProvider;
use depot::repository::Repository;
use depot::resolver::ActionResolver;
use depot::resolver::InstallWalker;
use depot::resolver::ResolveRequest;
use depot::resolver::UninstallWalker;
use depot::resolver::UpdateWalker;
use depot::PackageOperation;

use depot_test_utils::json_round_trip;
use depot_test_utils::repository;
use depot_test_utils::spec;
use depot_test_utils::version;
use depot_test_utils::PackageBuilder;

/// A small web-stack shaped source repository used by most scenarios.
fn source() -> InMemoryRepository {
	repository("source", vec![
		PackageBuilder::new("WebHost", "1.0").assembly()
			.depends_on("Router", Some("[1.0,2.0)"))
			.depends_on("Json", Some("1.0"))
			.build(),
		PackageBuilder::new("Router", "1.2").assembly()
			.depends_on("Json", Some("1.0"))
			.build(),
		PackageBuilder::new("Json", "1.0.3").assembly().build(),
		PackageBuilder::new("Json", "1.1.0").assembly().build(),
		PackageBuilder::new("Json", "2.0.0-beta").assembly().build(),
	])
}

fn names(operations: &[PackageOperation]) -> Vec<String> {
	operations.iter().map(|o| o.to_string()).collect()
}

fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn install_resolves_a_full_stack_in_dependency_order() {
	init_logging();
	let local = InMemoryRepository::new("installed");
	let source = source();

	let root = source.find_package("WebHost", &version("1.0")).unwrap();
	let ops = InstallWalker::new(&local, &source).resolve_operations(root).unwrap();

	/* Lowest satisfying Json, shared once, dependencies ahead of dependents */
	assert_eq!(names(&ops), vec!["Install Json 1.0.3", "Install Router 1.2", "Install WebHost 1.0"]);
}

#[test]
fn install_survives_a_json_snapshot_round_trip() {
	let (source, _dir) = json_round_trip(&source()).unwrap();
	let local = InMemoryRepository::new("installed");

	let root = source.find_package("WebHost", &version("1.0")).unwrap();
	let ops = InstallWalker::new(&local, &source).resolve_operations(root).unwrap();
	assert_eq!(ops.len(), 3);
}

#[test]
fn framework_specific_dependencies_follow_the_target() {
	let net40 = FrameworkName::new("net", version("4.0"));
	let net45 = FrameworkName::new("net", version("4.5"));

	let source = repository("source", vec![
		PackageBuilder::new("App", "1.0").assembly()
			.depends_on("Portable", None)
			.depends_on_for(net40.clone(), "Compat", None)
			.build(),
		PackageBuilder::new("Portable", "1.0").assembly().build(),
		PackageBuilder::new("Compat", "1.0").assembly().build(),
	]);
	let local = InMemoryRepository::new("installed");
	let root = source.find_package("App", &version("1.0")).unwrap();

	/* Targeting net 4.5: the net 4.0 set is the most specific compatible one */
	let ops = InstallWalker::new(&local, &source)
		.target_framework(net45)
		.resolve_operations(root.clone())
		.unwrap();
	assert_eq!(names(&ops), vec!["Install Compat 1.0", "Install App 1.0"]);

	/* No target: every declared dependency applies */
	let ops = InstallWalker::new(&local, &source).resolve_operations(root).unwrap();
	assert_eq!(names(&ops), vec!["Install Portable 1.0", "Install Compat 1.0", "Install App 1.0"]);
}

#[test]
fn pinned_range_steers_dependency_selection() {
	let local = InMemoryRepository::new("installed");
	let source = source();
	let mut pins = MapConstraintProvider::new("depot.config");
	pins.pin("Json", spec("[1.1,2.0)"));

	let root = source.find_package("Router", &version("1.2")).unwrap();
	let ops = InstallWalker::new(&local, &source)
		.constraints(&pins)
		.resolve_operations(root)
		.unwrap();
	assert_eq!(names(&ops), vec!["Install Json 1.1.0", "Install Router 1.2"]);
}

#[test]
fn prerelease_versions_need_opting_in() {
	let local = InMemoryRepository::new("installed");
	let source = repository("source", vec![
		PackageBuilder::new("App", "1.0").assembly().depends_on("Json", Some("2.0.0-beta")).build(),
		PackageBuilder::new("Json", "2.0.0-beta").assembly().build(),
	]);

	let root = source.find_package("App", &version("1.0")).unwrap();
	assert!(InstallWalker::new(&local, &source).resolve_operations(root.clone()).is_err());

	let ops = InstallWalker::new(&local, &source)
		.allow_prerelease(true)
		.resolve_operations(root)
		.unwrap();
	assert_eq!(names(&ops), vec!["Install Json 2.0.0-beta", "Install App 1.0"]);
}

#[test]
fn installed_prerelease_satisfies_without_being_replaced() {
	/* A prerelease already on disk is a valid floor; the listed release in
	 * the source must not displace it */
	let local = repository("installed", vec![
		PackageBuilder::new("Json", "2.0.0-beta").assembly().build(),
	]);
	let source = repository("source", vec![
		PackageBuilder::new("App", "1.0").assembly().depends_on("Json", Some("1.0")).build(),
		PackageBuilder::new("Json", "2.0.0").assembly().build(),
	]);

	let root = source.find_package("App", &version("1.0")).unwrap();
	let ops = InstallWalker::new(&local, &source).resolve_operations(root).unwrap();
	assert_eq!(names(&ops), vec!["Install App 1.0"]);
}

#[test]
fn install_then_uninstall_restores_the_starting_state() {
	let mut local = InMemoryRepository::new("installed");
	let source = source();

	let root = source.find_package("WebHost", &version("1.0")).unwrap();
	let ops = InstallWalker::new(&local, &source).resolve_operations(root.clone()).unwrap();
	for op in &ops {
		local.add_package((*op.package).clone());
	}
	assert_eq!(local.get_packages().len(), 3);

	let ops = UninstallWalker::new(&local)
		.remove_dependencies(true)
		.resolve_operations(root)
		.unwrap();
	assert_eq!(names(&ops), vec!["Uninstall WebHost 1.0", "Uninstall Router 1.2", "Uninstall Json 1.0.3"]);
	for op in &ops {
		local.remove_package(&op.identity());
	}
	assert!(local.get_packages().is_empty());
}

#[test]
fn update_cascades_through_the_installed_stack() {
	init_logging();
	let local = repository("installed", vec![
		PackageBuilder::new("WebHost", "1.0").assembly()
			.depends_on("Router", Some("[1.0,2.0)"))
			.build(),
		PackageBuilder::new("Router", "1.2").assembly().build(),
	]);
	let source = repository("source", vec![
		PackageBuilder::new("WebHost", "2.0").assembly()
			.depends_on("Router", Some("[2.0,3.0)"))
			.build(),
		PackageBuilder::new("Router", "2.0").assembly().build(),
	]);

	let target = source.find_package("WebHost", &version("2.0")).unwrap();
	let ops = UpdateWalker::new(&local, &source).resolve_operations(target).unwrap();
	assert_eq!(names(&ops), vec![
		"Uninstall WebHost 1.0", "Uninstall Router 1.2",
		"Install Router 2.0", "Install WebHost 2.0",
	]);
}

#[test]
fn batched_requests_share_dependencies_once() {
	let local = InMemoryRepository::new("installed");
	let source = source();

	let webhost = source.find_package("WebHost", &version("1.0")).unwrap();
	let router = source.find_package("Router", &version("1.2")).unwrap();

	let ops = ActionResolver::new(&local, &source)
		.resolve(&[ResolveRequest::install(router), ResolveRequest::install(webhost)])
		.unwrap();
	assert_eq!(ops.len(), 3);
	assert_eq!(ops[0].package.id, "Json");
}

#[test]
fn tool_packages_stay_out_of_project_stacks() {
	let source = repository("source", vec![
		PackageBuilder::new("Scaffold", "1.0").tool()
			.depends_on("Json", None)
			.build(),
		PackageBuilder::new("Json", "1.0.3").assembly().build(),
	]);
	let local = InMemoryRepository::new("installed");

	let root = source.find_package("Scaffold", &version("1.0")).unwrap();
	let err = InstallWalker::new(&local, &source).resolve_operations(root).unwrap_err();
	assert_eq!(
		err.to_string(),
		"External packages cannot depend on packages that target projects. 'Scaffold 1.0' depends on 'Json 1.0.3'."
	);
}

#[test]
fn unlisted_packages_are_a_last_resort() {
	let local = InMemoryRepository::new("installed");
	let source = repository("source", vec![
		PackageBuilder::new("App", "1.0").assembly().depends_on("Legacy", None).build(),
		PackageBuilder::new("Legacy", "1.0").assembly().listed(false).build(),
		PackageBuilder::new("Legacy", "1.1").assembly().build(),
	]);

	let root = source.find_package("App", &version("1.0")).unwrap();
	let ops = InstallWalker::new(&local, &source).resolve_operations(root).unwrap();
	assert_eq!(names(&ops), vec!["Install Legacy 1.1", "Install App 1.0"]);
}

#[test]
fn min_client_version_gates_the_whole_install() {
	let local = InMemoryRepository::new("installed");
	let source = repository("source", vec![
		PackageBuilder::new("Future", "1.0").assembly().min_client_version("999.0").build(),
	]);

	let root: Arc<_> = source.find_package("Future", &version("1.0")).unwrap();
	let err = InstallWalker::new(&local, &source).resolve_operations(root).unwrap_err();
	assert!(err.to_string().contains("requires client version '999.0'"));
}
