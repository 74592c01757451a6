//! Root resolution and initialization through the controller.

mod common;

use std::sync::Arc;

use common::MemoryNavigator;
use oxnav_core::prefs::PreferenceError;
use oxnav_core::{
    FileController, InitStatus, MemoryPreferences, MemoryStorage, NavError, Preferences,
    ROOT_LOCATION_KEY, RootSource,
};

#[tokio::test]
async fn test_wait_for_init_runs_resolution_once() {
    let storage = MemoryStorage::new();
    storage.insert_dir("/elsewhere");
    let prefs = MemoryPreferences::with_value(ROOT_LOCATION_KEY, "mem:///elsewhere/");
    let nav = MemoryNavigator::with(storage, prefs);

    let (a, b, c) = tokio::join!(
        nav.controller.wait_for_init(),
        nav.controller.initialize(),
        nav.controller.wait(),
    );
    let first = a.unwrap();
    assert_eq!(first, b.unwrap());
    assert_eq!(first, c.unwrap());

    for _ in 0..10 {
        assert_eq!(nav.controller.wait_for_init().await.unwrap(), first);
    }
    assert_eq!(nav.storage.root_calls(), 1);
    assert_eq!(nav.storage.resolve_calls(), 1);
}

#[tokio::test]
async fn test_operations_wait_for_pending_init() {
    let nav = MemoryNavigator::new();
    assert_eq!(nav.controller.status(), InitStatus::Pending);

    // Issued before initialization has had a chance to run.
    let listing = nav.controller.list_children(None, false).await.unwrap();
    assert!(listing.is_empty());
    assert_eq!(nav.controller.status(), InitStatus::Ready);
    assert_eq!(nav.storage.root_calls(), 1);
}

#[tokio::test]
async fn test_remembered_root_is_used() {
    let storage = MemoryStorage::new();
    storage.insert_file("/work/todo.txt", "ship it");
    let prefs = MemoryPreferences::with_value(ROOT_LOCATION_KEY, "mem:///work/");
    let nav = MemoryNavigator::with(storage, prefs);

    let state = nav.controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Remembered);
    assert_eq!(state.root().location(), "mem:///work/");

    let file = nav
        .controller
        .read_file_by_name("todo.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.content, "ship it");
}

#[tokio::test]
async fn test_invalid_remembered_root_falls_back_and_heals() {
    let prefs = MemoryPreferences::with_value(ROOT_LOCATION_KEY, "mem:///gone/");
    let nav = MemoryNavigator::with(MemoryStorage::new(), prefs);

    let state = nav.controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Fallback);
    assert_eq!(state.root(), state.default_root());
    assert_eq!(
        nav.prefs.value(ROOT_LOCATION_KEY).as_deref(),
        Some("mem:///persistent/")
    );

    // The next launch resolves the healed preference without falling back.
    let next = nav.restart();
    let state = next.controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Remembered);
    assert_eq!(state.root().location(), "mem:///persistent/");
}

#[tokio::test]
async fn test_unresolvable_location_falls_back() {
    let storage = MemoryStorage::new();
    storage.insert_dir("/revoked");
    storage.fail_resolution("mem:///revoked/");
    let prefs = MemoryPreferences::with_value(ROOT_LOCATION_KEY, "mem:///revoked/");
    let nav = MemoryNavigator::with(storage, prefs);

    let state = nav.controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Fallback);
}

#[tokio::test]
async fn test_garbage_location_falls_back() {
    let prefs = MemoryPreferences::with_value(ROOT_LOCATION_KEY, "https://example.com/x");
    let nav = MemoryNavigator::with(MemoryStorage::new(), prefs);

    let state = nav.controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Fallback);
}

#[derive(Debug)]
struct BrokenPreferences;

impl Preferences for BrokenPreferences {
    fn get(&self, _key: &str) -> Result<Option<String>, PreferenceError> {
        Err(PreferenceError::NoConfigDir)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), PreferenceError> {
        Err(PreferenceError::NoConfigDir)
    }
}

#[tokio::test]
async fn test_broken_preferences_do_not_fail_init() {
    let storage = MemoryStorage::new();
    let controller = FileController::new(Arc::new(storage.clone()), Arc::new(BrokenPreferences));

    let state = controller.wait_for_init().await.unwrap();
    assert_eq!(state.source(), RootSource::Default);

    let root = controller.root().await.unwrap();
    let err = controller.remember_root(&root).await.unwrap_err();
    assert!(matches!(err, NavError::Preference(_)));
}

#[tokio::test]
async fn test_capability_unavailable_is_fatal_for_every_operation() {
    let storage = MemoryStorage::new();
    storage.fail_root();
    let nav = MemoryNavigator::with(storage, MemoryPreferences::new());

    let err = nav.controller.wait_for_init().await.unwrap_err();
    assert!(err.to_string().contains("unavailable"));
    assert_eq!(nav.controller.status(), InitStatus::Failed);

    assert!(matches!(
        nav.controller.root().await,
        Err(NavError::Init(_))
    ));
    assert!(matches!(
        nav.controller.list_children(None, true).await,
        Err(NavError::Init(_))
    ));
    assert!(matches!(
        nav.controller.write_file_by_name("a.txt", "x").await,
        Err(NavError::Init(_))
    ));
    assert_eq!(nav.storage.root_calls(), 1);
}

#[tokio::test]
async fn test_remember_root_applies_on_next_launch() {
    let nav = MemoryNavigator::new();
    let projects = nav
        .controller
        .get_directory("projects", None, true)
        .await
        .unwrap();

    nav.controller.remember_root(&projects).await.unwrap();
    // The running controller keeps its root.
    assert_eq!(
        nav.controller.root().await.unwrap().location(),
        "mem:///persistent/"
    );

    let next = nav.restart();
    assert_eq!(
        next.controller.root().await.unwrap().location(),
        "mem:///persistent/projects/"
    );
}
