//! Snapshot capture and serde round-trips.

#![cfg(feature = "serde")]

use pool_mesh::snapshot::{MeshSnapshot, SNAPSHOT_VERSION};
use pool_mesh::{NodeId, Orchestrator, PoolMesh, StarMesh};

/// Pools with starting levels, then a fixed set of connects.
fn build<M: PoolMesh + Default>() -> (M, Vec<NodeId>) {
    let mut mesh = M::default();
    let ids: Vec<NodeId> = [10, 20, 12, 10, 20, -3]
        .iter()
        .map(|&level| {
            let id = mesh.create();
            mesh.add(id, level);
            id
        })
        .collect();
    mesh.connect(ids[0], ids[1]);
    mesh.connect(ids[2], ids[0]);
    mesh.connect(ids[4], ids[3]);
    (mesh, ids)
}

#[test]
fn test_snapshot_captures_partition() {
    let (mut mesh, ids) = build::<StarMesh>();
    let snapshot = MeshSnapshot::from_mesh(&mut mesh);

    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.node_count, 6);
    assert_eq!(snapshot.component_count(), 3);

    let triple = snapshot.find_component(ids[1]).expect("ids[1] must be captured");
    assert_eq!(triple.size, 3);
    assert_eq!(triple.level, 14);
    assert!(triple.contains(ids[2]));

    let lone = snapshot.find_component(ids[5]).expect("ids[5] must be captured");
    assert_eq!(lone.members, vec![ids[5]]);
    assert_eq!(lone.level, -3);
}

#[test]
fn test_snapshot_json_round_trip() {
    let (mut mesh, _) = build::<Orchestrator>();
    let snapshot = MeshSnapshot::from_mesh(&mut mesh);

    let json = serde_json::to_string(&snapshot).expect("serialise");
    let restored: MeshSnapshot = serde_json::from_str(&json).expect("deserialise");
    assert_eq!(restored, snapshot);
}

#[test]
fn test_representations_agree_on_shape() {
    let (mut star, _) = build::<StarMesh>();
    let (mut orchestrator, _) = build::<Orchestrator>();
    let a = MeshSnapshot::from_mesh(&mut star);
    let b = MeshSnapshot::from_mesh(&mut orchestrator);
    assert!(a.same_shape(&b), "star {a:?} vs orchestrator {b:?}");
}

#[test]
fn test_shape_differs_after_extra_connect() {
    let (mut star, ids) = build::<StarMesh>();
    let (mut orchestrator, _) = build::<Orchestrator>();
    star.connect(ids[5], ids[0]);
    let a = MeshSnapshot::from_mesh(&mut star);
    let b = MeshSnapshot::from_mesh(&mut orchestrator);
    assert!(!a.same_shape(&b));
}

#[test]
fn test_snapshot_skips_released_pools() {
    let (mut mesh, ids) = build::<Orchestrator>();
    mesh.release(ids[3]).unwrap();
    let snapshot = MeshSnapshot::from_mesh(&mut mesh);
    assert_eq!(snapshot.node_count, 5);
    assert!(snapshot.find_component(ids[3]).is_none());

    let pair = snapshot.find_component(ids[4]).expect("ids[4] must be captured");
    assert_eq!(pair.size, 2);
    assert_eq!(pair.members, vec![ids[4]]);
}

#[test]
fn test_node_id_serialises_as_struct() {
    let mut mesh = StarMesh::new();
    let id = mesh.create();
    let json = serde_json::to_value(id).expect("serialise");
    assert_eq!(json, serde_json::json!({ "index": 0, "generation": 0 }));
}
