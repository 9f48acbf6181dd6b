//! Unit tests for the module registry and loader.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rstest::rstest;
use serde_json::json;

use super::*;
use crate::internal::Echo;
use crate::module::ModuleKind;
use crate::protocol::Request;
use crate::tests::support::{ScriptDir, scripts};

const TIMEOUT: Duration = Duration::from_secs(10);

fn internal_registry() -> ModuleRegistry {
    let mut builder = ModuleRegistry::builder(TIMEOUT);
    builder.load_internal();
    builder.build()
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn empty_builder_yields_empty_registry() {
    let registry = ModuleRegistry::builder(TIMEOUT).build();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

#[test]
fn load_internal_registers_builtins() {
    let registry = internal_registry();
    assert_eq!(registry.names(), ["echo", "inventory", "ping", "status"]);
    assert!(registry.iter().all(|module| module.kind() == ModuleKind::Internal));
}

#[test]
fn insert_returns_replaced_module() {
    let mut builder = ModuleRegistry::builder(TIMEOUT);
    assert!(builder.insert(Arc::new(Echo::new())).is_none());
    let previous = builder.insert(Arc::new(Echo::new()));
    assert_eq!(previous.map(|module| module.name().to_owned()), Some("echo".to_owned()));
    assert_eq!(builder.build().len(), 1);
}

#[test]
fn lookup_misses_unknown_names() {
    assert!(internal_registry().lookup("nope").is_none());
}

#[test]
fn debug_lists_module_names() {
    let rendered = format!("{:?}", internal_registry());
    assert!(rendered.contains("echo"), "unexpected: {rendered}");
}

#[rstest]
#[case::none(&[], "found no action")]
#[case::one(&["ping"], "action: ping")]
#[case::many(&["install", "remove"], "actions: install, remove")]
fn describe_actions_formats_list(#[case] actions: &[&str], #[case] expected: &str) {
    assert_eq!(describe_actions(actions), expected);
}

// ---------------------------------------------------------------------------
// External loading
// ---------------------------------------------------------------------------

#[rstest]
fn partial_failures_are_skipped(scripts: ScriptDir) {
    scripts.module("10-valid", "pkg", &["install"], "echo '{}'");
    scripts.script("20-broken", "echo 'no metadata today' >&2\nexit 1");
    let plain = scripts.module("30-plain", "plain", &["a"], "echo '{}'");
    fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).expect("chmod");
    fs::create_dir(scripts.path().join("40-nested")).expect("create subdirectory");

    let mut builder = ModuleRegistry::builder(TIMEOUT);
    let report = builder.load_external(scripts.path());
    let registry = builder.build();

    assert_eq!(registry.names(), ["pkg"]);
    assert_eq!(report.loaded().len(), 1);
    assert_eq!(report.loaded().first().map(|m| m.name.as_str()), Some("pkg"));
    assert!(!report.is_clean());

    let failed: Vec<String> = report
        .failures()
        .iter()
        .map(|failure| {
            assert!(matches!(failure.error, ModuleError::ModuleLoad { .. }));
            failure
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();
    assert_eq!(failed, ["20-broken", "30-plain"]);
}

#[rstest]
fn later_module_with_same_name_wins(scripts: ScriptDir) {
    scripts.module("a-first", "dup", &["which"], "echo '{\"file\":\"first\"}'");
    scripts.module("b-second", "dup", &["which"], "echo '{\"file\":\"second\"}'");

    let mut builder = ModuleRegistry::builder(TIMEOUT);
    let report = builder.load_external(scripts.path());
    let registry = builder.build();

    assert_eq!(report.loaded().len(), 2);
    assert_eq!(registry.len(), 1);

    let module = registry.lookup("dup").expect("dup registered");
    let result = module
        .perform_request("which", &Request::new("1", "controller", "dup", "which"))
        .expect("action succeeds");
    assert_eq!(result.get("file"), Some(&json!("second")));
}

#[rstest]
fn external_module_can_shadow_builtin(scripts: ScriptDir) {
    scripts.module("echo-override", "echo", &["echo"], "echo '{\"shadowed\":true}'");

    let mut builder = ModuleRegistry::builder(TIMEOUT);
    builder.load_internal();
    builder.load_external(scripts.path());
    let registry = builder.build();

    let module = registry.lookup("echo").expect("echo registered");
    assert_eq!(module.kind(), ModuleKind::External);
}

#[rstest]
fn missing_directory_loads_nothing(scripts: ScriptDir) {
    let mut builder = ModuleRegistry::builder(TIMEOUT);
    builder.load_internal();
    let report = builder.load_external(&scripts.path().join("does-not-exist"));
    let registry = builder.build();

    assert!(report.loaded().is_empty());
    assert!(report.is_clean());
    assert_eq!(registry.len(), 4);
}

#[rstest]
fn empty_directory_loads_nothing(scripts: ScriptDir) {
    let mut builder = ModuleRegistry::builder(TIMEOUT);
    let report = builder.load_external(scripts.path());
    assert!(report.loaded().is_empty());
    assert!(report.is_clean());
    assert!(builder.build().is_empty());
}

#[test]
fn unreadable_entry_does_not_hide_the_rest_of_the_directory() {
    let dir = Path::new("/modules");
    let entries = [
        Ok(dir.join("b-pkg")),
        Err(io::Error::other("stale entry")),
        Ok(dir.join("a-svc")),
    ];

    assert_eq!(
        keep_files(dir, entries),
        [dir.join("a-svc"), dir.join("b-pkg")]
    );
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

#[test]
fn concurrent_lookups_share_one_registry() {
    let registry = Arc::new(internal_registry());
    thread::scope(|scope| {
        for _ in 0..4 {
            let shared = Arc::clone(&registry);
            scope.spawn(move || {
                let module = shared.lookup("ping").expect("ping registered");
                let result = module
                    .perform_request("ping", &Request::new("1", "controller", "ping", "ping"))
                    .expect("ping succeeds");
                assert_eq!(result.get("status"), Some(&json!("ok")));
            });
        }
    });
}
