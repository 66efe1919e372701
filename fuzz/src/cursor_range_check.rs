#![no_main]

use std::collections::BTreeMap;
use std::ops::Bound;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use mvart::{RootNode, Value12};

#[derive(Arbitrary, Debug)]
struct Input {
    keys: Vec<Vec<u8>>,
    ops: Vec<CursorOp>,
}

#[derive(Arbitrary, Debug, Clone)]
enum CursorOp {
    Seek { key: Vec<u8> },
    SeekIndex { index: u16 },
    Walk { steps: u8, forward: bool },
    Range { start: Vec<u8>, end: Vec<u8> },
    EraseTo { other: Vec<u8> },
    Upsert { key: Vec<u8>, val: u8 },
}

// A leading FF FF FF FF would read as a child pointer.
fn value(seed: u8) -> [u8; 12] {
    [seed & 0x7F; 12]
}

fn index_of(map: &BTreeMap<Vec<u8>, [u8; 12]>, key: &[u8]) -> u64 {
    map.range::<[u8], _>(..key).count() as u64
}

fuzz_target!(|input: Input| {
    let mut tree: RootNode<Value12> = RootNode::new();
    let mut reference_map = BTreeMap::new();
    for (i, key) in input.keys.into_iter().enumerate() {
        tree.insert(&key, &value(i as u8)).unwrap();
        reference_map.insert(key, value(i as u8));
    }
    let mut cursor = tree.cursor();

    for op in input.ops {
        match op {
            CursorOp::Seek { key } => {
                let found = cursor.seek(&tree, &key).unwrap();
                let expected = reference_map.range(key.clone()..).next();
                assert_eq!(found, expected.is_some());
                if let Some((k, v)) = expected {
                    assert_eq!(&cursor.key(&tree).unwrap(), k);
                    assert_eq!(cursor.value(&tree).unwrap(), v);
                    assert_eq!(cursor.calc_index(&tree).unwrap(), index_of(&reference_map, k));
                }
            }
            CursorOp::SeekIndex { index } => {
                let found = cursor.seek_index(&tree, index as u64).unwrap();
                let expected = reference_map.keys().nth(index as usize);
                assert_eq!(found, expected.is_some());
                if let Some(k) = expected {
                    assert_eq!(&cursor.key(&tree).unwrap(), k);
                }
            }
            CursorOp::Walk { steps, forward } => {
                if !cursor.is_valid(&tree) {
                    continue;
                }
                let Ok(start) = cursor.key(&tree) else {
                    continue;
                };
                let mut expected: Vec<_> = if forward {
                    reference_map.range(start..).map(|(k, _)| k.clone()).collect()
                } else {
                    reference_map.range(..=start).rev().map(|(k, _)| k.clone()).collect()
                };
                expected.truncate(steps as usize + 1);
                for (i, k) in expected.iter().enumerate() {
                    assert_eq!(&cursor.key(&tree).unwrap(), k);
                    let more = if forward {
                        cursor.move_next(&tree).unwrap()
                    } else {
                        cursor.move_previous(&tree).unwrap()
                    };
                    if !more {
                        assert_eq!(i + 1, expected.len());
                        break;
                    }
                }
            }
            CursorOp::Range { start, end } => {
                if start > end {
                    continue;
                }
                let got: Vec<_> = tree
                    .range(start.clone()..end.clone())
                    .map(|(k, _)| k)
                    .collect();
                let expected: Vec<_> = reference_map
                    .range::<Vec<u8>, _>((Bound::Included(&start), Bound::Excluded(&end)))
                    .map(|(k, _)| k.clone())
                    .collect();
                assert_eq!(got, expected);
            }
            CursorOp::EraseTo { other } => {
                if !cursor.is_valid(&tree) {
                    continue;
                }
                let Ok(from) = cursor.key(&tree) else {
                    continue;
                };
                let mut end = tree.cursor();
                if !end.seek(&tree, &other).unwrap() {
                    continue;
                }
                let to = end.key(&tree).unwrap();
                let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
                let doomed: Vec<_> = reference_map
                    .range(lo..=hi)
                    .map(|(k, _)| k.clone())
                    .collect();
                let removed = cursor.erase_to(&mut tree, &mut end).unwrap();
                assert_eq!(removed, doomed.len() as u64);
                for k in doomed {
                    reference_map.remove(&k);
                }
                assert!(!cursor.is_valid(&tree));
            }
            CursorOp::Upsert { key, val } => {
                let added = cursor.upsert(&mut tree, &key, &value(val)).unwrap();
                assert_eq!(added, reference_map.insert(key.clone(), value(val)).is_none());
                assert_eq!(cursor.key(&tree).unwrap(), key);
            }
        }
    }

    assert_eq!(tree.len(), reference_map.len() as u64);
    tree.validate().unwrap();
});
