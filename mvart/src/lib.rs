//! Multi-version Adaptive Radix Tree.
//!
//! An ordered map from byte-string keys to byte-string values, laid out as
//! an adaptive radix tree of raw, reference-counted nodes. Any number of
//! read-only snapshots share nodes with one writable handle; a write copies
//! only the nodes on the path it modifies.
//!
//! - [`RootNode`]: a versioned handle with snapshots, writable transactions,
//!   commit and revert, plus map-style helpers and iteration.
//! - [`Cursor`]: positioned access with exact and nearest lookup, movement in
//!   both directions, rank/select, upsert and range erase.
//! - [`ValueRepr`]: how values are stored in nodes. [`VarValue`] uses 8-byte
//!   child slots, [`Value12`] and [`VarValue12`] use 12-byte slots.
//!
//! ```rust
//! use mvart::RootNode;
//!
//! let mut tree: RootNode = RootNode::new();
//! tree.insert(b"apple", b"red").unwrap();
//! tree.insert(b"apricot", b"orange").unwrap();
//! tree.insert(b"banana", b"yellow").unwrap();
//!
//! let mut cursor = tree.cursor();
//! assert!(cursor.seek_index(&tree, 1).unwrap());
//! assert_eq!(cursor.key(&tree).unwrap(), b"apricot");
//!
//! let keys: Vec<_> = tree.prefix_iter(b"ap").map(|(key, _)| key).collect();
//! assert_eq!(keys, vec![b"apple".to_vec(), b"apricot".to_vec()]);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod alloc;
pub mod config;
pub mod cursor;
mod engine;
pub mod error;
pub mod iter;
mod node;
pub mod range;
pub mod root;
pub mod stats;
pub mod utils;
pub mod value;

pub use alloc::{Allocator, CountingAllocator, HeapAllocator};
pub use config::TreeOptions;
pub use cursor::{Cursor, FindResult};
pub use error::{ArtError, Result};
pub use iter::Iter;
pub use node::NodeType;
pub use range::Range;
pub use root::{MAX_KEY_LEN, RootNode};
pub use stats::{NodeStats, TreeStats, TreeStatsTrait};
pub use value::{Value12, ValueRepr, VarValue, VarValue12};
