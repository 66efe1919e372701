//! Miri tests for node memory handling.
//!
//! Small trees pushed through every node class, copy-on-write and release
//! path, so Miri can check the raw block accesses, pointer tagging and
//! reference counting.
//!
//! Note: These tests are only compiled when SIMD features are disabled,
//! as Miri cannot handle SIMD instructions.

#![cfg(not(feature = "simd_keys"))]

use std::sync::Arc;

use mvart::{CountingAllocator, RootNode, TreeOptions, Value12, ValueRepr, VarValue, VarValue12};

fn counted<R: ValueRepr>() -> (Arc<CountingAllocator>, RootNode<R>) {
    let alloc = Arc::new(CountingAllocator::new());
    let options = TreeOptions::new()
        .with_allocator(alloc.clone())
        .check_mutations(true);
    (alloc, RootNode::with_options(options))
}

fn value<R: ValueRepr>(seed: u8, len: usize) -> Vec<u8> {
    match R::FIXED_LEN {
        Some(fixed) => vec![seed & 0x7F; fixed],
        None => vec![seed; len],
    }
}

/// Grow one node through every class and shrink it back down.
fn grow_and_shrink<R: ValueRepr>() {
    let (alloc, mut tree) = counted::<R>();
    for i in 0..=255u8 {
        tree.insert(&[b'k', i], &value::<R>(i, i as usize % 10)).unwrap();
    }
    assert_eq!(tree.len(), 256);
    for i in (0..=255u8).rev() {
        assert!(tree.remove(&[b'k', i]).unwrap());
    }
    assert!(tree.is_empty());
    drop(tree);
    assert_eq!(alloc.live_blocks(), 0);
    assert_eq!(alloc.live_bytes(), 0);
}

#[test]
fn miri_grow_and_shrink() {
    grow_and_shrink::<VarValue>();
    grow_and_shrink::<Value12>();
    grow_and_shrink::<VarValue12>();
}

/// Writes after a snapshot must copy shared nodes, never touch them.
fn snapshot_copy_on_write<R: ValueRepr>() {
    let (alloc, mut tree) = counted::<R>();
    for i in 0..40u8 {
        tree.insert(&[i % 5, i], &value::<R>(i, 12)).unwrap();
    }
    let snapshot = tree.snapshot();
    for i in 0..40u8 {
        tree.insert(&[i % 5, i], &value::<R>(i + 1, 3)).unwrap();
    }
    tree.remove_prefix(&[2]).unwrap();
    RootNode::validate_shared(&[&tree, &snapshot]).unwrap();
    for i in 0..40u8 {
        assert_eq!(snapshot.get(&[i % 5, i]), Some(&value::<R>(i, 12)[..]));
    }
    drop(snapshot);
    drop(tree);
    assert_eq!(alloc.live_blocks(), 0);
}

#[test]
fn miri_snapshot_copy_on_write() {
    snapshot_copy_on_write::<VarValue>();
    snapshot_copy_on_write::<Value12>();
    snapshot_copy_on_write::<VarValue12>();
}

/// A snapshot read and dropped on another thread while the writer goes on.
#[test]
fn miri_snapshot_on_other_thread() {
    let (alloc, mut tree) = counted::<VarValue>();
    for i in 0..20u8 {
        tree.insert(&[i, i, i], &[i]).unwrap();
    }
    let snapshot = tree.snapshot();
    let reader = std::thread::spawn(move || snapshot.iter().count());
    for i in 0..20u8 {
        tree.remove(&[i, i, i]).unwrap();
    }
    assert_eq!(reader.join().unwrap(), 20);
    drop(tree);
    assert_eq!(alloc.live_blocks(), 0);
}
