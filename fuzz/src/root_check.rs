#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use mvart::{RootNode, TreeOptions};

#[derive(Arbitrary, Debug, Clone)]
enum TreeOp {
    Get { key: Vec<u8> },
    Insert { key: Vec<u8>, val: Vec<u8> },
    Remove { key: Vec<u8> },
    RemovePrefix { prefix: Vec<u8> },
    Snapshot,
    Transaction { snapshot: usize, key: Vec<u8>, val: Vec<u8> },
    Revert { snapshot: usize },
}

fuzz_target!(|ops: Vec<TreeOp>| {
    let mut tree: RootNode = RootNode::with_options(TreeOptions::new().check_mutations(true));
    let mut reference_map = BTreeMap::<Vec<u8>, Vec<u8>>::new();
    let mut snapshots: Vec<(RootNode, BTreeMap<Vec<u8>, Vec<u8>>)> = Vec::new();

    for op in ops {
        match op {
            TreeOp::Get { key } => {
                assert_eq!(
                    tree.get(&key),
                    reference_map.get(&key).map(Vec::as_slice),
                    "Get mismatch for key {key:?}"
                );
            }
            TreeOp::Insert { key, val } => {
                let added = tree.insert(&key, &val).unwrap();
                assert_eq!(added, reference_map.insert(key, val).is_none());
            }
            TreeOp::Remove { key } => {
                let removed = tree.remove(&key).unwrap();
                assert_eq!(removed, reference_map.remove(&key).is_some());
            }
            TreeOp::RemovePrefix { prefix } => {
                let before = reference_map.len();
                reference_map.retain(|k, _| !k.starts_with(&prefix));
                let removed = tree.remove_prefix(&prefix).unwrap();
                assert_eq!(removed, (before - reference_map.len()) as u64);
            }
            TreeOp::Snapshot => {
                snapshots.push((tree.snapshot(), reference_map.clone()));
            }
            TreeOp::Transaction { snapshot, key, val } => {
                if snapshots.is_empty() {
                    continue;
                }
                let (base, base_map) = &snapshots[snapshot % snapshots.len()];
                let mut txn = base.create_writable_transaction().unwrap();
                txn.insert(&key, &val).unwrap();
                txn.commit().unwrap();
                let mut expected = base_map.clone();
                expected.insert(key.clone(), val);
                assert_eq!(txn.len(), expected.len() as u64);
                assert_eq!(txn.get(&key), expected.get(&key).map(Vec::as_slice));
                assert_eq!(base.get(&key), base_map.get(&key).map(Vec::as_slice));
            }
            TreeOp::Revert { snapshot } => {
                if snapshots.is_empty() {
                    continue;
                }
                let (base, base_map) = &snapshots[snapshot % snapshots.len()];
                tree.revert_to(base).unwrap();
                reference_map = base_map.clone();
            }
        }
    }

    for (snapshot, snapshot_map) in &snapshots {
        let contents: Vec<_> = snapshot.iter().map(|(k, v)| (k, v.to_vec())).collect();
        let expected: Vec<_> = snapshot_map.clone().into_iter().collect();
        assert_eq!(contents, expected, "Snapshot diverged from its reference map");
    }
    let contents: Vec<_> = tree.iter().map(|(k, v)| (k, v.to_vec())).collect();
    let expected: Vec<_> = reference_map.into_iter().collect();
    assert_eq!(contents, expected, "Final tree diverged from reference map");

    let mut handles: Vec<&RootNode> = snapshots.iter().map(|(s, _)| s).collect();
    handles.push(&tree);
    RootNode::validate_shared(&handles).unwrap();
});
