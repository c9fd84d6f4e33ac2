//! Chunked prefix tree mapping action names to actions.
//!
//! An action name is cut into fixed-size chunks (3 bytes by default, the
//! last one zero-padded). Each trie level compares one whole chunk, so a
//! lookup for `"predict_price"` costs five node hops instead of thirteen:
//!
//! ```text
//! root ─┬─ "che" ── "ck\0"            (check)
//!       ├─ "dev" ── "ice"             (device)
//!       └─ "pre" ── "dic" ─┬─ "t\0\0" (predict)
//!                          └─ "t_p" ── "ric" ── "e\0\0" (predict_price)
//! ```
//!
//! Siblings live in a flat `Vec` kept sorted by chunk value, so child
//! selection is a binary search over a cache-friendly array.
//!
//! # Example
//!
//! ```
//! use xrpc::router::ActionTrie;
//!
//! let mut trie: ActionTrie<&str> = ActionTrie::new();
//! trie.insert(b"predict", "predict").unwrap();
//! trie.insert(b"predict_price", "price").unwrap();
//!
//! assert_eq!(trie.get(b"predict"), Some(&"predict"));
//! assert_eq!(trie.get(b"predict_price"), Some(&"price"));
//! assert!(trie.lookup(b"predict_p").is_none());
//! ```

use crate::error::{Result, XrpcError};

/// Default chunk ("peace") size in bytes.
pub const CHUNK_SIZE: usize = 3;

/// Split the head chunk off `name`, zero-padding a short tail.
///
/// Returns `None` once `name` is exhausted.
#[inline]
fn split_chunk<const N: usize>(name: &[u8]) -> Option<([u8; N], &[u8])> {
    if name.is_empty() {
        return None;
    }
    let mut chunk = [0u8; N];
    let take = name.len().min(N);
    chunk[..take].copy_from_slice(&name[..take]);
    Some((chunk, &name[take..]))
}

/// One trie level: a chunk, its sorted children and an optional action.
#[derive(Debug, Clone)]
pub struct TrieNode<A, const N: usize = CHUNK_SIZE> {
    chunk: [u8; N],
    children: Vec<TrieNode<A, N>>,
    action: Option<A>,
}

impl<A, const N: usize> TrieNode<A, N> {
    fn new(chunk: [u8; N]) -> Self {
        Self {
            chunk,
            children: Vec::new(),
            action: None,
        }
    }

    /// The chunk this node matches.
    #[inline]
    pub fn chunk(&self) -> &[u8; N] {
        &self.chunk
    }

    /// Child nodes, sorted by chunk value.
    #[inline]
    pub fn children(&self) -> &[TrieNode<A, N>] {
        &self.children
    }

    /// Action bound to the name ending at this node, if any.
    #[inline]
    pub fn action(&self) -> Option<&A> {
        self.action.as_ref()
    }

    fn child(&self, chunk: &[u8; N]) -> Option<&TrieNode<A, N>> {
        self.children
            .binary_search_by(|node| node.chunk.cmp(chunk))
            .ok()
            .map(|i| &self.children[i])
    }

    fn child_or_insert(&mut self, chunk: [u8; N]) -> &mut TrieNode<A, N> {
        let index = match self.children.binary_search_by(|node| node.chunk.cmp(&chunk)) {
            Ok(i) => i,
            Err(i) => {
                self.children.insert(i, TrieNode::new(chunk));
                i
            }
        };
        &mut self.children[index]
    }

    fn count_actions(&self) -> usize {
        let own = usize::from(self.action.is_some());
        own + self
            .children
            .iter()
            .map(TrieNode::count_actions)
            .sum::<usize>()
    }
}

/// Trie of actions keyed by byte-string names.
///
/// Mutation needs `&mut self`; share the finished trie behind an `Arc` (or
/// inside a `Service`) once lookups run concurrently.
#[derive(Debug, Clone)]
pub struct ActionTrie<A, const N: usize = CHUNK_SIZE> {
    root: TrieNode<A, N>,
}

impl<A, const N: usize> ActionTrie<A, N> {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self {
            root: TrieNode::new([0u8; N]),
        }
    }

    /// Bind `action` to `name`.
    ///
    /// Missing levels are created on the way down. An existing binding is
    /// overwritten and returned.
    ///
    /// # Errors
    ///
    /// Returns [`XrpcError::EmptyActionName`] if `name` is empty.
    pub fn insert(&mut self, name: &[u8], action: A) -> Result<Option<A>> {
        if name.is_empty() {
            return Err(XrpcError::EmptyActionName);
        }

        let mut node = &mut self.root;
        let mut rest = name;
        while let Some((chunk, tail)) = split_chunk::<N>(rest) {
            node = node.child_or_insert(chunk);
            rest = tail;
        }

        Ok(node.action.replace(action))
    }

    /// Walk the exact chunk path of `name`.
    ///
    /// Unlike [`lookup`](Self::lookup) this also returns path-through nodes
    /// that have no action bound. Returns `None` for an empty name.
    pub fn find_node(&self, name: &[u8]) -> Option<&TrieNode<A, N>> {
        let (first, mut rest) = split_chunk::<N>(name)?;
        let mut node = self.root.child(&first)?;
        while let Some((chunk, tail)) = split_chunk::<N>(rest) {
            node = node.child(&chunk)?;
            rest = tail;
        }
        Some(node)
    }

    /// Find the node holding the action registered for `name`.
    ///
    /// Returns `None` when the chunk path is absent or ends on a
    /// path-through node.
    pub fn lookup(&self, name: &[u8]) -> Option<&TrieNode<A, N>> {
        self.find_node(name).filter(|node| node.action.is_some())
    }

    /// Action registered for `name`.
    #[inline]
    pub fn get(&self, name: &[u8]) -> Option<&A> {
        self.find_node(name).and_then(TrieNode::action)
    }

    /// Root node (zeroed sentinel chunk).
    #[inline]
    pub fn root(&self) -> &TrieNode<A, N> {
        &self.root
    }

    /// Number of names with a bound action.
    pub fn len(&self) -> usize {
        self.root.count_actions()
    }

    /// True if no action is registered.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

impl<A, const N: usize> Default for ActionTrie<A, N> {
    fn default() -> Self {
        Self::new()
    }
}
