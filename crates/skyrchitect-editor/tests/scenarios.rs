//! Keyboard-driven editing scenarios, from key event to document state.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use skyrchitect_core::{DocumentModel, Edge, Mutation, Node, NodeId, Position, ResourceKind, ShortcutRegistry};
use skyrchitect_editor::{CommandDispatcher, DispatchError, Disposition, Editor, FocusContext, KeyInput};
use skyrchitect_session::{
    AutosaveConfig, Autosaver, InlineWriter, MemoryStore, SnapshotKey, SnapshotStore, SnapshotWriter, UserId,
};

struct Fixture {
    editor: Editor,
    a: NodeId,
    b: NodeId,
    c: NodeId,
}

/// Nodes A, B, C with edges A->B and B->C
fn abc() -> Fixture {
    let mut model = DocumentModel::new("abc");
    let nodes: Vec<Node> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, label)| Node::new(ResourceKind::Compute, *label, Position::new(200.0 * i as f64, 0.0)))
        .collect();
    let (a, b, c) = (nodes[0].id, nodes[1].id, nodes[2].id);
    for node in nodes {
        model.apply(Mutation::AddNode(node)).unwrap();
    }
    model.apply(Mutation::AddEdge(Edge::new(a, b))).unwrap();
    model.apply(Mutation::AddEdge(Edge::new(b, c))).unwrap();
    Fixture {
        editor: Editor::new(model),
        a,
        b,
        c,
    }
}

fn press(dispatcher: &mut CommandDispatcher, editor: &mut Editor, input: KeyInput) -> Disposition {
    dispatcher.enqueue(input);
    let mut results = dispatcher.drain(editor, Instant::now());
    assert_eq!(results.len(), 1);
    results.remove(0).outcome.unwrap()
}

fn labels(editor: &Editor) -> Vec<&str> {
    editor.document().nodes().iter().map(|n| n.label.as_str()).collect()
}

#[test]
fn delete_key_removes_selected_node_and_its_edges() {
    let Fixture { mut editor, a, b, c } = abc();
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();
    editor.selection_mut().insert(b);

    let disposition = press(&mut dispatcher, &mut editor, KeyInput::new("Delete"));

    assert!(disposition.is_consumed());
    assert_eq!(labels(&editor), ["A", "C"]);
    assert!(editor.document().edges().is_empty());
    assert!(editor.selection().is_empty());
    assert!(editor.document().graph.contains_node(a));
    assert!(editor.document().graph.contains_node(c));
}

#[test]
fn select_all_copy_paste_adds_fresh_copies() {
    let mut model = DocumentModel::new("two");
    let a = Node::new(ResourceKind::Storage, "A", Position::new(0.0, 0.0));
    let b = Node::new(ResourceKind::Database, "B", Position::new(200.0, 0.0));
    let originals: HashSet<NodeId> = [a.id, b.id].into();
    model.apply(Mutation::AddNode(a)).unwrap();
    model.apply(Mutation::AddNode(b)).unwrap();
    let mut editor = Editor::new(model);
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();

    press(&mut dispatcher, &mut editor, KeyInput::new("a").ctrl());
    assert_eq!(editor.selection().as_set(), &originals);

    press(&mut dispatcher, &mut editor, KeyInput::new("c").ctrl());
    press(&mut dispatcher, &mut editor, KeyInput::new("v").ctrl());

    assert_eq!(editor.document().nodes().len(), 4);
    let selected = editor.selection().as_set();
    assert_eq!(selected.len(), 2);
    assert!(selected.is_disjoint(&originals));
    assert!(selected.iter().all(|id| editor.document().graph.contains_node(*id)));
}

#[test]
fn undo_and_redo_chords_walk_history() {
    let Fixture { mut editor, b, .. } = abc();
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();
    editor.selection_mut().insert(b);
    press(&mut dispatcher, &mut editor, KeyInput::new("Backspace"));
    let after_delete = editor.document().graph.clone();

    assert_eq!(
        press(&mut dispatcher, &mut editor, KeyInput::new("z").ctrl()),
        Disposition::Handled(skyrchitect_core::Action::Undo)
    );
    assert_eq!(labels(&editor), ["A", "B", "C"]);
    assert_eq!(editor.document().edges().len(), 2);

    // shift changes the chord; Z arrives upper-cased from some front ends
    assert_eq!(
        press(&mut dispatcher, &mut editor, KeyInput::new("Z").ctrl().shift()),
        Disposition::Handled(skyrchitect_core::Action::Redo)
    );
    assert_eq!(editor.document().graph, after_delete);

    press(&mut dispatcher, &mut editor, KeyInput::new("z").meta());
    press(&mut dispatcher, &mut editor, KeyInput::new("y").ctrl());
    assert_eq!(editor.document().graph, after_delete);
    // every step was a versioned mutation: 5 setup, delete, undo, redo, undo, redo
    assert_eq!(editor.model().version(), 10);
}

#[test]
fn text_focus_suppresses_shortcuts() {
    let Fixture { mut editor, b, .. } = abc();
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();
    editor.selection_mut().insert(b);
    dispatcher.set_focus(FocusContext::TextInput);

    let disposition = press(&mut dispatcher, &mut editor, KeyInput::new("Backspace"));
    assert!(!disposition.is_consumed());
    assert_eq!(editor.document().nodes().len(), 3);

    dispatcher.set_focus(FocusContext::Canvas);
    assert!(press(&mut dispatcher, &mut editor, KeyInput::new("Backspace")).is_consumed());
    assert_eq!(editor.document().nodes().len(), 2);
}

#[test]
fn unbound_keys_pass_through() {
    let Fixture { mut editor, .. } = abc();
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();
    let version = editor.model().version();
    assert_eq!(
        press(&mut dispatcher, &mut editor, KeyInput::new("q").alt()),
        Disposition::PassThrough
    );
    assert_eq!(editor.model().version(), version);
}

#[test]
fn queued_events_run_in_arrival_order() {
    let Fixture { mut editor, .. } = abc();
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();

    // select all, delete, undo: order matters for the final state
    dispatcher.enqueue(KeyInput::new("a").ctrl());
    dispatcher.enqueue(KeyInput::new("Delete"));
    dispatcher.enqueue(KeyInput::new("z").ctrl());
    assert_eq!(dispatcher.pending(), 3);

    let results = dispatcher.drain(&mut editor, Instant::now());
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| matches!(r.outcome, Ok(d) if d.is_consumed())));
    assert_eq!(dispatcher.pending(), 0);
    assert_eq!(editor.document().nodes().len(), 3);
    assert!(editor.selection().is_empty());
}

#[test]
fn second_listener_fails_until_first_is_dropped() {
    let first = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();
    assert!(matches!(
        CommandDispatcher::attach(ShortcutRegistry::defaults()),
        Err(DispatchError::AlreadyAttached)
    ));
    drop(first);
    assert!(CommandDispatcher::attach(ShortcutRegistry::defaults()).is_ok());
}

#[test]
fn save_chord_flushes_through_autosave() {
    let Fixture { editor, .. } = abc();
    let store = MemoryStore::new();
    let key = SnapshotKey::new(UserId::new("erin"), editor.model().id());
    let writer: Box<dyn SnapshotWriter> = Box::new(InlineWriter::new(store.clone()));
    let config = AutosaveConfig {
        enabled: false,
        ..AutosaveConfig::default()
    };
    let autosaver = Autosaver::new(key.clone(), config, writer, editor.document(), false, Instant::now());
    let mut editor = editor.with_autosave(autosaver);
    let mut dispatcher = CommandDispatcher::attach(ShortcutRegistry::defaults()).unwrap();

    assert!(editor.autosave_status().has_unsaved_changes);
    press(&mut dispatcher, &mut editor, KeyInput::new("s").ctrl());
    editor.tick(Instant::now() + Duration::from_millis(1));

    let stored = store.get(&key).unwrap().unwrap();
    assert_eq!(stored.version, editor.model().version());
    assert!(!editor.autosave_status().has_unsaved_changes);
    assert!(!editor.autosave_status().saving);
}

proptest! {
    #[test]
    fn repeated_pastes_never_reuse_ids(pastes in 1usize..8, duplicates in 0usize..4) {
        let Fixture { mut editor, a, b, c } = abc();
        let now = Instant::now();
        editor.selection_mut().replace([a, b, c]);
        editor.invoke(skyrchitect_core::Action::Copy, now).unwrap();
        for _ in 0..pastes {
            editor.invoke(skyrchitect_core::Action::Paste, now).unwrap();
        }
        for _ in 0..duplicates {
            editor.invoke(skyrchitect_core::Action::Duplicate, now).unwrap();
        }

        let doc = editor.document();
        let node_ids: HashSet<_> = doc.nodes().iter().map(|n| n.id).collect();
        let edge_ids: HashSet<_> = doc.edges().iter().map(|e| e.id).collect();
        prop_assert_eq!(node_ids.len(), 3 * (1 + pastes + duplicates));
        prop_assert_eq!(node_ids.len(), doc.nodes().len());
        prop_assert_eq!(edge_ids.len(), doc.edges().len());
        prop_assert_eq!(doc.edges().len(), 2 * (1 + pastes + duplicates));
        prop_assert!(doc.graph.validate().is_ok());
    }
}
