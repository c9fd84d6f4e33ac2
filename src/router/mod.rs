//! Router module - maps action names to registered actions.
//!
//! Provides:
//! - [`ActionTrie`] - fixed-size chunk prefix tree
//! - [`TrieNode`] - one trie level with sorted children

mod trie;

pub use trie::{ActionTrie, TrieNode, CHUNK_SIZE};
