//! Property tests for the document version and edge integrity invariants

use proptest::prelude::*;
use skyrchitect_core::{DocumentModel, Edge, Mutation, Node, NodeId, NodePatch, Position, ResourceKind};

/// Abstract op; indices are resolved against the live document at apply time
#[derive(Debug, Clone)]
enum Op {
    AddNode,
    RemoveNode(usize),
    Relabel(usize, u8),
    Connect(usize, usize),
    RemoveEdge(usize),
    Move(Vec<usize>, i8, i8),
    Ghost,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AddNode),
        1 => any::<usize>().prop_map(Op::RemoveNode),
        1 => (any::<usize>(), 0u8..3).prop_map(|(i, l)| Op::Relabel(i, l)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Connect(a, b)),
        1 => any::<usize>().prop_map(Op::RemoveEdge),
        2 => (prop::collection::vec(any::<usize>(), 0..4), -2i8..3, -2i8..3)
            .prop_map(|(ids, dx, dy)| Op::Move(ids, dx, dy)),
        1 => Just(Op::Ghost),
    ]
}

fn to_mutation(model: &DocumentModel, op: &Op) -> Option<Mutation> {
    let nodes = model.document().nodes();
    let edges = model.document().edges();
    let pick_node = |i: usize| (!nodes.is_empty()).then(|| nodes[i % nodes.len()].id);
    match op {
        Op::AddNode => Some(Mutation::AddNode(Node::new(
            ResourceKind::Compute,
            "n",
            Position::new(50.0, 50.0),
        ))),
        Op::RemoveNode(i) => pick_node(*i).map(Mutation::RemoveNode),
        Op::Relabel(i, l) => pick_node(*i).map(|id| Mutation::UpdateNode {
            id,
            patch: NodePatch::label(format!("label-{l}")),
        }),
        Op::Connect(a, b) => Some(Mutation::AddEdge(Edge::new(pick_node(*a)?, pick_node(*b)?))),
        Op::RemoveEdge(i) => {
            (!edges.is_empty()).then(|| Mutation::RemoveEdge(edges[i % edges.len()].id))
        }
        Op::Move(ids, dx, dy) => Some(Mutation::MoveSelection {
            ids: ids.iter().filter_map(|i| pick_node(*i)).collect(),
            dx: f64::from(*dx) * 10.0,
            dy: f64::from(*dy) * 10.0,
        }),
        Op::Ghost => Some(Mutation::RemoveNode(NodeId::new())),
    }
}

proptest! {
    #[test]
    fn version_counts_effective_mutations(ops in prop::collection::vec(op(), 0..60)) {
        let mut model = DocumentModel::default();
        let mut effective = 0u64;

        for op in &ops {
            let Some(mutation) = to_mutation(&model, op) else { continue };
            let before = model.version();
            match model.apply(mutation) {
                Ok(applied) => {
                    if applied.changed {
                        effective += 1;
                        prop_assert_eq!(model.version(), before + 1);
                    } else {
                        prop_assert_eq!(model.version(), before);
                    }
                }
                Err(_) => prop_assert_eq!(model.version(), before),
            }
            prop_assert_eq!(model.version(), effective);
            prop_assert!(model.graph().validate().is_ok());
        }
    }
}
