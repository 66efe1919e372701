use std::collections::BTreeMap;

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;

use mvart::{RootNode, TreeOptions, VarValue};

fn small_key() -> impl Strategy<Value = Vec<u8>> {
    vec(0u8..4, 0..8)
}

fn checked_tree() -> RootNode<VarValue> {
    RootNode::with_options(TreeOptions::new().check_mutations(true))
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
    RemovePrefix(Vec<u8>),
    Snapshot,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (small_key(), vec(any::<u8>(), 0..20)).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => small_key().prop_map(Op::Remove),
        1 => vec(0u8..4, 0..3).prop_map(Op::RemovePrefix),
        1 => Just(Op::Snapshot),
    ]
}

proptest! {
    #[test]
    fn iteration_is_sorted_and_complete(entries in btree_map(small_key(), vec(any::<u8>(), 0..16), 0..64)) {
        let mut tree = checked_tree();
        for (key, value) in &entries {
            tree.insert(key, value).unwrap();
        }
        prop_assert_eq!(tree.len(), entries.len() as u64);
        let got: Vec<_> = tree.iter().map(|(k, v)| (k, v.to_vec())).collect();
        let expected: Vec<_> = entries.clone().into_iter().collect();
        prop_assert_eq!(&got, &expected);
        let mut reversed: Vec<_> = tree.iter().rev().map(|(k, v)| (k, v.to_vec())).collect();
        reversed.reverse();
        prop_assert_eq!(reversed, expected);
    }

    #[test]
    fn rank_and_select_are_inverse(keys in vec(small_key(), 1..64)) {
        let mut tree = checked_tree();
        for key in &keys {
            tree.insert(key, b"").unwrap();
        }
        let mut cursor = tree.cursor();
        for index in 0..tree.len() {
            prop_assert!(cursor.seek_index(&tree, index).unwrap());
            prop_assert_eq!(cursor.calc_index(&tree).unwrap(), index);
        }
        prop_assert!(!cursor.seek_index(&tree, tree.len()).unwrap());
    }

    #[test]
    fn snapshots_see_their_version(ops in vec(op(), 1..80)) {
        let mut tree = checked_tree();
        let mut model = BTreeMap::new();
        let mut snapshots = Vec::new();
        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    prop_assert_eq!(tree.insert(&key, &value).unwrap(), model.insert(key, value).is_none());
                }
                Op::Remove(key) => {
                    prop_assert_eq!(tree.remove(&key).unwrap(), model.remove(&key).is_some());
                }
                Op::RemovePrefix(prefix) => {
                    let before = model.len();
                    model.retain(|k: &Vec<u8>, _| !k.starts_with(&prefix));
                    prop_assert_eq!(tree.remove_prefix(&prefix).unwrap(), (before - model.len()) as u64);
                }
                Op::Snapshot => snapshots.push((tree.snapshot(), model.clone())),
            }
        }
        for (snapshot, expected) in &snapshots {
            let got: BTreeMap<_, _> = snapshot.iter().map(|(k, v)| (k, v.to_vec())).collect();
            prop_assert_eq!(&got, expected);
        }
        let mut handles: Vec<&RootNode> = snapshots.iter().map(|(s, _)| s).collect();
        handles.push(&tree);
        prop_assert!(RootNode::validate_shared(&handles).is_ok());
    }

    #[test]
    fn range_erase_removes_exactly_the_range(
        keys in vec(small_key(), 1..64),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let mut tree = checked_tree();
        let mut model = BTreeMap::new();
        for key in keys {
            tree.insert(&key, &key).unwrap();
            model.insert(key.clone(), key);
        }
        let sorted: Vec<_> = model.keys().cloned().collect();
        let (a, b) = (a.index(sorted.len()), b.index(sorted.len()));
        let mut left = tree.cursor();
        let mut right = tree.cursor();
        prop_assert!(left.find_exact(&tree, &sorted[a]).unwrap());
        prop_assert!(right.find_exact(&tree, &sorted[b]).unwrap());
        let removed = left.erase_to(&mut tree, &mut right).unwrap();
        prop_assert_eq!(removed as usize, a.abs_diff(b) + 1);
        for key in &sorted[a.min(b)..=a.max(b)] {
            model.remove(key);
        }
        let got: Vec<_> = tree.iter().map(|(k, _)| k).collect();
        let expected: Vec<_> = model.into_keys().collect();
        prop_assert_eq!(got, expected);
    }
}
