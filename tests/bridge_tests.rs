use maxbridge_core::engine::{JUMP_TO_FILESYSTEM, JUMP_TO_SHOTGUN, REBUILD_MENU_ACTION};
use maxbridge_core::version::{release_from_version_id, year_from_release};
use maxbridge_core::{
    ActionRegistry, AppInstance, Capability, Command, CommandKind, Compatibility, Context, DispatchOutcome,
    Engine, EngineSettings, EntityRef, HostBridge, MaxVersion, MenuBuilder, ModalGuard, RecordingHost,
    UserSettings,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn engine(host: &Arc<RecordingHost>) -> Arc<Engine> {
    Arc::new(Engine::new(
        host.clone(),
        EngineSettings::default(),
        Context::default(),
    ))
}

fn action_id(engine: &Engine, label: &str) -> String {
    engine
        .menu()
        .expect("menu built")
        .all_actions()
        .into_iter()
        .find(|(l, _)| *l == label)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| panic!("no action labelled {}", label))
}

#[test]
fn test_guard_restored_after_error() {
    let guard = ModalGuard::new();
    let result: anyhow::Result<()> = guard.run_modal(|| anyhow::bail!("dialog failed"));
    assert!(result.is_err());
    assert!(guard.is_enabled());
}

#[test]
fn test_guard_restored_after_panic() {
    let guard = ModalGuard::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = guard.scope();
        assert!(!guard.is_enabled());
        panic!("dialog crashed");
    }));
    assert!(result.is_err());
    assert!(guard.is_enabled());
}

#[test]
fn test_version_mapping() {
    assert_eq!(MaxVersion::from_version_id(17000 << 16).year, 2015);
    assert_eq!(MaxVersion::from_version_id(19000 << 16).year, 2017);
    assert_eq!(release_from_version_id((21000 << 16) | 0x1234), 21000);
    assert_eq!(year_from_release(22000), 2020);
    assert_eq!(year_from_release(22001), 2021);
}

#[test]
fn test_dispatch_runs_registered_command_once() {
    let host = Arc::new(RecordingHost::new());
    let engine = engine(&host);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = engine.register_app(AppInstance::new("tk-multi-workfiles2", "Shotgun Workfiles"));
    engine.register_command(
        Command::new("File Open...", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_app(app),
    );
    engine.rebuild_menu().unwrap();

    let id = action_id(&engine, "File Open...");
    assert_eq!(engine.dispatch(&id), DispatchOutcome::Invoked);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ids_survive_context_change() {
    let host = Arc::new(RecordingHost::new());
    let engine = engine(&host);
    engine.register_command(Command::new("Snapshot", || Ok(())));
    engine.rebuild_menu().unwrap();
    let before = action_id(&engine, "Snapshot");

    let tree = engine
        .change_context(Context {
            project: Some(EntityRef::new("Project", 65, "Demo")),
            ..Context::default()
        })
        .unwrap();
    assert!(tree.submenu("Demo").is_some());
    assert_eq!(action_id(&engine, "Snapshot"), before);
    assert_eq!(engine.dispatch(&before), DispatchOutcome::Invoked);
}

#[test]
fn test_stale_ids_are_pruned_on_rebuild() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let old = builder
        .build(&[Command::new("Old Tool", || Ok(()))], &[], "Site", &[])
        .unwrap();
    let (_, old_id) = old.all_actions()[0];
    builder
        .build(&[Command::new("New Tool", || Ok(()))], &[], "Site", &[])
        .unwrap();

    assert!(registry.resolve(old_id.as_str()).is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_context_menu_has_jump_actions() {
    let host = Arc::new(RecordingHost::new());
    let context = Context {
        project: Some(EntityRef::new("Project", 65, "Demo")),
        entity: Some(EntityRef::new("Shot", 1184, "ABC_123")),
        step: Some(EntityRef::new("Step", 5, "Lighting")),
        task: None,
        shotgun_url: "https://example.shotgunstudio.com/detail/Shot/1184".to_string(),
        filesystem_locations: vec!["/projects/demo/shots/ABC_123".into()],
    };
    let engine = Arc::new(Engine::new(
        host.clone(),
        EngineSettings::default(),
        context,
    ));
    engine.register_command(
        Command::new("Work Area Info...", || Ok(())).with_kind(CommandKind::ContextMenu),
    );
    let tree = engine.rebuild_menu().unwrap();

    let ctx = tree.submenu("Lighting, Shot ABC_123").expect("context submenu");
    assert_eq!(
        ctx.action_labels(),
        vec![JUMP_TO_SHOTGUN, JUMP_TO_FILESYSTEM, "Work Area Info..."]
    );

    let id = action_id(&engine, JUMP_TO_SHOTGUN);
    assert_eq!(engine.dispatch(&id), DispatchOutcome::Invoked);
    assert_eq!(
        host.launched(),
        vec!["https://example.shotgunstudio.com/detail/Shot/1184".to_string()]
    );
}

#[test]
fn test_no_filesystem_jump_without_locations() {
    let host = Arc::new(RecordingHost::new());
    let engine = engine(&host);
    let tree = engine.rebuild_menu().unwrap();
    let ctx = tree.submenu("Site").expect("context submenu");
    assert_eq!(ctx.action_labels(), vec![JUMP_TO_SHOTGUN]);
}

#[test]
fn test_init_warns_on_unsupported_version() {
    let host = Arc::new(RecordingHost::new().with_release(16000));
    let engine = engine(&host);
    assert_eq!(engine.init().unwrap(), Compatibility::Unsupported);
    let boxes = host.message_boxes();
    assert_eq!(boxes.len(), 1);
    assert!(boxes[0].1.contains("prior to 2015"));
    assert_eq!(host.menu_enabled(), Some(true));
}

fn untested_count(host: &RecordingHost) -> usize {
    host.advisories()
        .into_iter()
        .filter(|a| a.message.contains("not yet been fully tested"))
        .count()
}

#[test]
fn test_untested_advisory_remembers_dismissal() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("user_settings.json");

    // 23000 is 3ds Max 2021
    let host = Arc::new(
        RecordingHost::new()
            .with_release(23000)
            .with_advisory_reply(true),
    );
    let engine = Engine::new(host.clone(), EngineSettings::default(), Context::default())
        .with_user_settings(UserSettings::open(&prefs, "tk-3dsmaxplus").unwrap());
    assert_eq!(engine.init().unwrap(), Compatibility::Untested);

    assert_eq!(untested_count(&host), 1);
    // the advisory ran under the guard
    assert_eq!(host.menu_enabled(), Some(true));

    let stored = UserSettings::open(&prefs, "tk-3dsmaxplus").unwrap();
    assert_eq!(stored.retrieve_u32("untested_version_dismissed_year"), Some(2021));
    assert!(stored.retrieve_bool("skip_update_engine_dialog", false));

    let again = Arc::new(RecordingHost::new().with_release(23000));
    let engine = Engine::new(again.clone(), EngineSettings::default(), Context::default())
        .with_user_settings(UserSettings::open(&prefs, "tk-3dsmaxplus").unwrap());
    engine.init().unwrap();
    assert_eq!(untested_count(&again), 0);
    assert!(again.advisories().is_empty());

    // a newer release asks again
    let newer = Arc::new(RecordingHost::new().with_release(24000));
    let engine = Engine::new(newer.clone(), EngineSettings::default(), Context::default())
        .with_user_settings(UserSettings::open(&prefs, "tk-3dsmaxplus").unwrap());
    engine.init().unwrap();
    assert_eq!(untested_count(&newer), 1);
}

#[test]
fn test_menu_reload_hook() {
    let host = Arc::new(
        RecordingHost::new()
            .with_release(19000)
            .with_capability(Capability::MenuPostLoadNotification),
    );
    let engine = engine(&host);
    engine.register_command(Command::new("Publish...", || Ok(())));
    engine.post_init().unwrap();

    assert!(host.evaluated()[0].contains("#postLoadingMenus"));
    assert!(host.has_menu_reload_hook());
    assert!(engine.registry().resolve(REBUILD_MENU_ACTION).is_some());

    // the host reloaded its menu file and dropped ours
    host.unregister_menu("Shotgun").unwrap();
    assert_eq!(engine.dispatch(REBUILD_MENU_ACTION), DispatchOutcome::Invoked);
    assert!(host.main_menu_bar().contains(&"Shotgun".to_string()));
    // the hook survives the rebuild it triggered
    assert!(engine.registry().resolve(REBUILD_MENU_ACTION).is_some());
}

#[test]
fn test_no_reload_hook_on_old_hosts() {
    let host = Arc::new(
        RecordingHost::new()
            .with_release(17000)
            .with_capability(Capability::MenuPostLoadNotification),
    );
    let engine = engine(&host);
    engine.post_init().unwrap();
    assert!(engine.registry().resolve(REBUILD_MENU_ACTION).is_none());
    assert!(host.evaluated().iter().all(|s| !s.contains("#postLoadingMenus")));
}

#[test]
fn test_destroy_removes_menu_and_actions() {
    let host = Arc::new(RecordingHost::new());
    let engine = engine(&host);
    engine.register_command(Command::new("Publish...", || Ok(())));
    engine.post_init().unwrap();
    let id = action_id(&engine, "Publish...");

    engine.destroy();
    assert!(!host.main_menu_bar().contains(&"Shotgun".to_string()));
    assert!(engine.registry().is_empty());
    assert_eq!(engine.dispatch(&id), DispatchOutcome::NotFound);
}

#[test]
fn test_destroy_removes_menu_reload_hook() {
    let host = Arc::new(
        RecordingHost::new()
            .with_release(19000)
            .with_capability(Capability::MenuPostLoadNotification),
    );
    let engine = engine(&host);
    engine.post_init().unwrap();
    assert!(host.has_menu_reload_hook());

    engine.destroy();
    assert!(!host.has_menu_reload_hook());
    assert!(host
        .evaluated()
        .last()
        .map_or(false, |s| s.contains("callbacks.removeScripts id:#sgtk_menu_reload")));
}

#[test]
fn test_destroy_without_hook_leaves_callbacks_alone() {
    let host = Arc::new(RecordingHost::new().with_release(17000));
    let engine = engine(&host);
    engine.post_init().unwrap();
    engine.destroy();
    assert!(host
        .evaluated()
        .iter()
        .all(|s| !s.contains("callbacks.removeScripts")));
}
