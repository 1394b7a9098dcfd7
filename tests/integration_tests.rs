//! Module resolution and installation tests.
//!
//! Resolution runs against `FakeModules` instead of modprobe/modinfo, so the
//! closure, exclusion and unsupported-kernel behaviour can be checked without
//! a real kernel tree.

mod helpers;

use helpers::{assert_file_contains, assert_file_exists, fake_path, FakeModules, TestEnv, KERNEL};
use initrd_layout::config::Config;
use initrd_layout::modules::install::{install_modules, MANIFEST_NAME};
use initrd_layout::modules::{
    KernelSupportProbe, ModuleDependencyDb, ModuleResolver, RequestedModules, ResolvedModuleSet,
};
use initrd_layout::report::{Diagnostics, Origin};
use serial_test::serial;
use std::fs;

fn directives(text: &str) -> ModuleDependencyDb {
    let mut db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();
    db.parse_source(text, "test.conf", &mut diags);
    assert!(diags.is_empty(), "unexpected directive diagnostics");
    db
}

fn resolve(
    query: &FakeModules,
    db: &ModuleDependencyDb,
    request: &[&str],
    diags: &mut Diagnostics,
) -> ResolvedModuleSet {
    let resolver = ModuleResolver::new(query, db, KernelSupportProbe::default());
    resolver.resolve(KERNEL, &RequestedModules::parse(request), diags)
}

// =============================================================================
// resolution tests
// =============================================================================

#[test]
fn test_exclusion_drops_unrelated_module() {
    let query = FakeModules::supported()
        .module("ext4", &["mbcache", "jbd2"])
        .module("usb-storage", &["usb-common"]);
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["ext4", "-usb-storage"], &mut diags);

    assert!(set.contains_module("ext4"));
    assert!(set.contains_module("jbd2"));
    assert!(!set.contains_module("usb-storage"));
    assert!(!set.contains_module("usb-common"));
    assert_eq!(set.short_names(), ["mbcache", "jbd2", "ext4"]);
    assert!(diags.is_empty());
}

#[test]
fn test_exclusion_keeps_transitive_dependency() {
    let query = FakeModules::supported().module("ext4", &["jbd2"]).module("jbd2", &[]);
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["ext4", "-jbd2"], &mut diags);

    assert!(set.contains_module("jbd2"));
    let requested: Vec<_> = query.calls().into_iter().map(|(m, _)| m).collect();
    assert_eq!(requested, ["ext4"]);
}

#[test]
fn test_declared_requirement_appended_after_module() {
    let query = FakeModules::supported().module("foo", &[]).file("bar");
    let db = directives("# INITRD: foo REQUIRES bar\n");
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["foo"], &mut diags);

    assert_eq!(set.paths(), [fake_path("foo"), fake_path("bar")]);
    assert_eq!(set.summary(), "Kernel Modules: foo bar");
}

#[test]
fn test_declared_requirements_are_recursive() {
    let query = FakeModules::supported()
        .module("usb-storage", &["usb-common"])
        .file("ehci-hcd")
        .file("ehci-pci");
    let db = directives(
        "# INITRD: usb-storage REQUIRES ehci-hcd\n\
         # INITRD: ehci_hcd REQUIRES ehci-pci\n",
    );
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["usb_storage"], &mut diags);

    assert_eq!(
        set.short_names(),
        ["usb-common", "usb-storage", "ehci-hcd", "ehci-pci"]
    );
}

#[test]
fn test_directive_cycle_terminates() {
    let query = FakeModules::supported().module("a", &[]).file("b");
    let db = directives("# INITRD: a REQUIRES b\n# INITRD: b REQUIRES a\n");
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["a"], &mut diags);
    assert_eq!(set.short_names(), ["a", "b"]);
}

#[test]
fn test_unresolvable_requirement_is_warning() {
    let query = FakeModules::supported().module("dm-crypt", &["dm-mod"]);
    let db = directives("# INITRD: dm-crypt REQUIRES aes-ni\n");
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["dm-crypt"], &mut diags);

    assert_eq!(set.short_names(), ["dm-mod", "dm-crypt"]);
    assert_eq!(diags.len(), 1);
    assert!(diags.mentions("cannot find aes-ni (required by dm-crypt)"));
}

#[test]
fn test_unknown_and_empty_modules_do_not_abort() {
    let mut query = FakeModules::supported().module("ext4", &[]);
    query.chains.insert("virtio_blk".into(), Vec::new());
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["nosuchmod", "virtio_blk", "ext4"], &mut diags);

    assert_eq!(set.short_names(), ["ext4"]);
    assert!(diags.mentions("unable to resolve module nosuchmod"));
    assert!(diags.mentions("no dependencies found for virtio_blk"));
    assert_eq!(diags.from_origin(Origin::Modules).count(), 2);
}

#[test]
fn test_shared_dependencies_listed_once() {
    let query = FakeModules::supported()
        .module("ext4", &["crc16", "mbcache", "jbd2"])
        .module("ocfs2", &["jbd2", "configfs"]);
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["ext4", "ocfs2"], &mut diags);
    assert_eq!(
        set.short_names(),
        ["crc16", "mbcache", "jbd2", "ext4", "configfs", "ocfs2"]
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let query = FakeModules::supported()
        .module("ext4", &["mbcache", "jbd2"])
        .module("sd_mod", &["scsi_mod"])
        .file("crc32c");
    let db = directives("# INITRD: ext4 REQUIRES crc32c\n");

    let mut diags = Diagnostics::quiet();
    let first = resolve(&query, &db, &["ext4", "sd_mod"], &mut diags);
    let second = resolve(&query, &db, &["ext4", "sd_mod"], &mut diags);
    assert_eq!(first.paths(), second.paths());
    assert_eq!(first.manifest(), second.manifest());
}

#[test]
fn test_unsupported_kernel_allows_unsupported_modules() {
    let mut query = FakeModules::supported().unsupported_module("vendor_raid");
    query.supported = Some(false);
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["vendor_raid"], &mut diags);

    assert!(set.contains_module("vendor_raid"));
    assert_eq!(query.calls(), [("vendor_raid".to_string(), true)]);
    assert!(diags.is_empty());
}

#[test]
fn test_supported_kernel_does_not_allow_unsupported() {
    let query = FakeModules::supported().unsupported_module("vendor_raid");
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["vendor_raid"], &mut diags);

    assert!(set.is_empty());
    assert_eq!(query.calls(), [("vendor_raid".to_string(), false)]);
    assert!(diags.mentions("unable to resolve module vendor_raid"));
}

#[test]
fn test_failed_probe_treated_as_supported() {
    let mut query = FakeModules::supported().module("ext4", &[]);
    query.supported = None;
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    resolve(&query, &db, &["ext4"], &mut diags);
    assert_eq!(query.calls(), [("ext4".to_string(), false)]);
}

#[test]
fn test_manifest_json() {
    let query = FakeModules::supported().module("ext4", &["jbd2"]);
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();

    let set = resolve(&query, &db, &["ext4"], &mut diags);
    let json = serde_json::to_value(&set).unwrap();
    let modules = json["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[1].as_str(), fake_path("ext4").to_str());
}

// =============================================================================
// installation tests
// =============================================================================

fn set_from_files(env: &TestEnv, query: FakeModules, request: &[&str]) -> ResolvedModuleSet {
    // point the fake chains at real files under the module root
    let mut query = query;
    for chain in query.chains.values_mut() {
        for path in chain.iter_mut() {
            let rel = path.file_name().unwrap().to_string_lossy().into_owned();
            *path = env.module_file(&rel);
        }
    }
    let db = ModuleDependencyDb::new();
    let mut diags = Diagnostics::quiet();
    resolve(&query, &db, request, &mut diags)
}

#[test]
fn test_install_copies_modules_and_writes_manifest() {
    let env = TestEnv::new();
    let modules_dir = env.module_root.join("lib/modules").join(KERNEL);
    fs::write(modules_dir.join("modules.builtin"), "kernel/fs/loop.ko\n").unwrap();

    let set = set_from_files(&env, FakeModules::supported().module("ext4", &["jbd2"]), &["ext4"]);
    let report = install_modules(&set, KERNEL, &env.module_root, &env.staging, true).unwrap();

    assert_eq!(report.installed.len(), 2);
    let staged = env.staging.join("lib/modules").join(KERNEL);
    assert_file_exists(&staged.join("kernel/jbd2.ko"));
    assert_file_exists(&staged.join("kernel/ext4.ko"));
    assert_file_exists(&staged.join("modules.builtin"));
    assert_eq!(report.manifest, staged.join(MANIFEST_NAME));
    assert_file_contains(&report.manifest, "kernel/jbd2.ko\n");
}

#[test]
fn test_install_missing_module_file_is_fatal() {
    let env = TestEnv::new();
    let set = set_from_files(&env, FakeModules::supported().module("ext4", &[]), &["ext4"]);
    fs::remove_file(&set.paths()[0]).unwrap();

    let err = install_modules(&set, KERNEL, &env.module_root, &env.staging, true).unwrap_err();
    assert!(err.to_string().contains("not on disk"));
}

#[test]
fn test_install_nothing_when_expected_is_fatal() {
    let env = TestEnv::new();
    let set = ResolvedModuleSet::default();

    let err = install_modules(&set, KERNEL, &env.module_root, &env.staging, true).unwrap_err();
    assert!(err.to_string().contains("no modules have been installed"));

    let report = install_modules(&set, KERNEL, &env.module_root, &env.staging, false).unwrap();
    assert!(report.installed.is_empty());
}

// =============================================================================
// configuration tests
// =============================================================================

#[test]
#[serial]
fn test_config_load_reads_environment() {
    std::env::set_var("INITRD_MODULES", "ext4 -floppy");
    std::env::set_var("INITRD_KERNEL_VERSION", KERNEL);
    std::env::set_var("INITRD_SENTINEL_MODULE", "ext4");

    let config = Config::load();

    std::env::remove_var("INITRD_MODULES");
    std::env::remove_var("INITRD_KERNEL_VERSION");
    std::env::remove_var("INITRD_SENTINEL_MODULE");

    assert_eq!(config.modules, ["ext4", "-floppy"]);
    assert_eq!(config.kernel_version.as_deref(), Some(KERNEL));
    assert_eq!(config.sentinel_module, "ext4");
    assert_eq!(
        RequestedModules::parse(&config.modules).modules,
        ["ext4"]
    );
}

#[test]
#[serial]
fn test_config_load_defaults_without_environment() {
    std::env::remove_var("INITRD_SCRIPTS_DIR");
    std::env::remove_var("INITRD_MODULES");

    let config = Config::load();
    assert_eq!(config.scripts_dir, std::path::PathBuf::from("/lib/initrd/scripts"));
    assert!(config.modules.is_empty());
}
