use maxbridge_core::{
    ActionRegistry, AppInstance, Command, CommandKind, EngineSettings, Favourite,
    IdentifierAllocator, MenuBuilder, MenuNode, RecordingHost,
};
use maxbridge_core::maxscript::quote;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn noop(name: &str) -> Command {
    Command::new(name, || Ok(()))
}

/// A and B belong to M1, C to M2, D to no app.
fn partition_commands() -> Vec<Command> {
    let m1 = Arc::new(AppInstance::new("tk-m1", "M1"));
    let m2 = Arc::new(AppInstance::new("tk-m2", "M2"));
    vec![
        noop("A").with_app(m1.clone()),
        noop("B").with_app(m1),
        noop("C").with_app(m2),
        noop("D"),
    ]
}

#[test]
fn test_partition_into_submenus_and_flat_entries() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let tree = builder.build(&partition_commands(), &[], "Site", &[]).unwrap();

    assert_eq!(tree.submenu_labels(), vec!["Site", "M1"]);
    assert_eq!(tree.submenu("M1").unwrap().action_labels(), vec!["A", "B"]);
    // C is alone in M2, D alone in "Other Items"
    assert_eq!(tree.action_labels(), vec!["C", "D"]);
    assert!(tree.submenu("M2").is_none());
    assert!(tree.submenu("Other Items").is_none());
}

#[test]
fn test_favourite_is_removed_from_its_group() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let favourites = vec![Favourite::new("tk-m1", "B")];
    let tree = builder
        .build(&partition_commands(), &favourites, "Site", &[])
        .unwrap();

    // B once in the favourites block, M1 reduced to a flat A
    assert_eq!(tree.action_labels(), vec!["B", "A", "C", "D"]);
    assert_eq!(tree.submenu_labels(), vec!["Site"]);
    let b_count = tree
        .all_actions()
        .into_iter()
        .filter(|(label, _)| *label == "B")
        .count();
    assert_eq!(b_count, 1);

    // the favourites block is bracketed by separators
    assert_eq!(tree.items[1], MenuNode::Separator);
    assert!(matches!(&tree.items[2], MenuNode::Action { label, .. } if label == "B"));
    assert_eq!(tree.items[3], MenuNode::Separator);
}

#[test]
fn test_favourite_for_other_app_is_ignored() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let favourites = vec![Favourite::new("tk-m2", "B")];
    let tree = builder
        .build(&partition_commands(), &favourites, "Site", &[])
        .unwrap();
    assert_eq!(tree.submenu("M1").unwrap().action_labels(), vec!["A", "B"]);
    assert_eq!(tree.action_labels(), vec!["C", "D"]);
}

#[test]
fn test_every_action_resolves_and_runs_once() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let counters: Vec<Arc<AtomicUsize>> = (0..4).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let app = Arc::new(AppInstance::new("tk-multi-publish2", "Publish"));
    let commands: Vec<Command> = ["Publish...", "Load...", "Work Area Info...", "Snapshot"]
        .iter()
        .zip(&counters)
        .map(|(name, counter)| {
            let counter = counter.clone();
            Command::new(*name, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .with_app(app.clone())
        })
        .map(|cmd| {
            if cmd.name == "Work Area Info..." {
                cmd.with_kind(CommandKind::ContextMenu)
            } else {
                cmd
            }
        })
        .collect();

    let tree = builder.build(&commands, &[], "Project Demo", &[]).unwrap();
    let actions = tree.all_actions();
    assert_eq!(actions.len(), 4);

    for (label, id) in actions {
        let target = registry.resolve(id.as_str()).expect("registered");
        assert_eq!(target.display_name, label);
        target.invoke().unwrap();
    }
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_rebuild_is_idempotent() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let first = builder.build(&partition_commands(), &[], "Site", &[]).unwrap();
    let second = builder.build(&partition_commands(), &[], "Site", &[]).unwrap();
    assert_eq!(first, second);

    let bar = host.main_menu_bar();
    assert_eq!(bar.iter().filter(|m| *m == "Shotgun").count(), 1);
    assert_eq!(bar[bar.len() - 2], "Shotgun");
    assert_eq!(bar.last().map(String::as_str), Some("&Help"));
    assert_eq!(host.menus().iter().filter(|m| *m == "Shotgun").count(), 1);

    // the registry holds only the live build's actions
    assert_eq!(registry.len(), second.all_actions().len());
}

#[test]
fn test_duplicate_names_get_distinct_ids() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let a = Arc::new(AppInstance::new("tk-a", "Alpha"));
    let b = Arc::new(AppInstance::new("tk-b", "Beta"));
    let commands = vec![
        noop("Publish...").with_app(a.clone()),
        noop("Reload").with_app(a),
        noop("Publish...").with_app(b.clone()),
        noop("Reload").with_app(b),
    ];
    let tree = builder.build(&commands, &[], "Site", &[]).unwrap();

    let ids: Vec<String> = tree
        .all_actions()
        .into_iter()
        .map(|(_, id)| id.to_string())
        .collect();
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 4);

    let base = IdentifierAllocator::new().base_id("Publish...").to_string();
    assert!(ids.contains(&base));
    assert!(ids.contains(&format!("{}_2", base)));

    // ids stay the same across rebuilds
    let again = builder.build(&commands, &[], "Site", &[]).unwrap();
    assert_eq!(tree, again);
}

#[test]
fn test_ids_use_identifier_alphabet() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let commands = vec![
        noop("Ünïcødé \"quoted\" name"),
        noop("semi; colon -- comment"),
        noop(""),
    ];
    let tree = builder.build(&commands, &[], "Site", &[]).unwrap();
    for (_, id) in tree.all_actions() {
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}

#[test]
fn test_malicious_label_stays_inside_string_literal() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings::default();
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let evil = "x\" ; DOSCommand \"del C:\\\\*\" ; \"";
    builder.build(&[noop(evil)], &[], "Site", &[]).unwrap();

    let script = host.evaluated().pop().unwrap();
    assert!(script.contains(&quote(evil)));
    // every occurrence is the escaped one
    assert_eq!(
        script.matches("DOSCommand").count(),
        script.matches("x\\\" ; DOSCommand").count()
    );
}

#[test]
fn test_custom_menu_label() {
    let host = RecordingHost::new();
    let registry = ActionRegistry::new();
    let settings = EngineSettings {
        menu_label: "Pipeline".to_string(),
        ..EngineSettings::default()
    };
    let builder = MenuBuilder::new(&host, &registry, &settings);

    let tree = builder.build(&[noop("Publish...")], &[], "Site", &[]).unwrap();
    assert_eq!(tree.label, "Pipeline");
    assert!(host.main_menu_bar().contains(&"Pipeline".to_string()));
}
