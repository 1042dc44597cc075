//! Append-only node sequence with O(1) branching.
//!
//! A [`Structure`] holds every node a particle has generated so far. Forking a
//! structure freezes its private tail into an immutable, reference-counted
//! segment that both the original and the fork keep as a shared prefix. Later
//! appends go to each side's private tail, so the two never observe each other's
//! growth while node ids inside the shared prefix stay valid for both.
//!
//! Segments no other structure references are merged on the next fork, so the
//! chain only grows where history actually branches.
use std::fmt;
use std::sync::Arc;

/// Index of a node inside a [`Structure`]; doubles as the attachment handle of a spawn point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub usize);

impl NodeId {
    /// Id of the root node of every structure.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Segment<N> {
    parent: Option<Arc<Segment<N>>>,
    start: usize,
    nodes: Vec<N>,
}

impl<N> Drop for Segment<N> {
    // Unlinks the chain iteratively; a recursive drop overflows the stack on long histories.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(segment) = parent {
            parent = Arc::into_inner(segment).and_then(|mut s| s.parent.take());
        }
    }
}

/// Ordered, append-only sequence of nodes sharing its history with its forks.
pub struct Structure<N> {
    frozen: Option<Arc<Segment<N>>>,
    frozen_len: usize,
    tail: Vec<N>,
}

impl<N> Structure<N> {
    /// Creates a structure holding only `root`.
    pub fn new(root: N) -> Self {
        Self {
            frozen: None,
            frozen_len: 0,
            tail: vec![root],
        }
    }

    /// Total number of nodes, shared prefix included.
    #[inline]
    pub fn len(&self) -> usize {
        self.frozen_len + self.tail.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root(&self) -> Option<&N> {
        self.get(NodeId::ROOT)
    }

    pub fn latest(&self) -> Option<&N> {
        match self.len() {
            0 => None,
            n => self.get(NodeId(n - 1)),
        }
    }

    /// Id of the most recently appended node.
    pub fn latest_id(&self) -> Option<NodeId> {
        self.len().checked_sub(1).map(NodeId)
    }

    pub fn get(&self, id: NodeId) -> Option<&N> {
        let idx = id.0;
        if idx >= self.frozen_len {
            return self.tail.get(idx - self.frozen_len);
        }
        let mut segment = self.frozen.as_deref();
        while let Some(seg) = segment {
            if idx >= seg.start {
                return seg.nodes.get(idx - seg.start);
            }
            segment = seg.parent.as_deref();
        }
        None
    }

    /// Appends a node and returns its id.
    pub fn push(&mut self, node: N) -> NodeId {
        self.tail.push(node);
        NodeId(self.len() - 1)
    }

    /// Branches the structure. Both `self` and the returned fork share every
    /// node appended so far; subsequent appends stay private to each side.
    pub fn fork(&mut self) -> Self {
        if !self.tail.is_empty() {
            let mut nodes = std::mem::take(&mut self.tail);
            let added = nodes.len();
            if let Some(head) = self.frozen.as_mut().and_then(Arc::get_mut) {
                head.nodes.append(&mut nodes);
            } else {
                self.frozen = Some(Arc::new(Segment {
                    parent: self.frozen.take(),
                    start: self.frozen_len,
                    nodes,
                }));
            }
            self.frozen_len += added;
        }
        self.compact();
        Self {
            frozen: self.frozen.clone(),
            frozen_len: self.frozen_len,
            tail: Vec::new(),
        }
    }

    /// Folds the head segment into every parent that only it still references.
    fn compact(&mut self) {
        let Some(head) = self.frozen.as_mut().and_then(Arc::get_mut) else {
            return;
        };
        while let Some(parent) = head.parent.take() {
            match Arc::try_unwrap(parent) {
                Ok(mut parent) => {
                    parent.nodes.append(&mut head.nodes);
                    head.nodes = std::mem::take(&mut parent.nodes);
                    head.start = parent.start;
                    head.parent = parent.parent.take();
                }
                Err(shared) => {
                    head.parent = Some(shared);
                    break;
                }
            }
        }
    }

    /// Number of frozen segments between the tail and the root.
    #[cfg(test)]
    pub(crate) fn segment_depth(&self) -> usize {
        let mut depth = 0;
        let mut segment = self.frozen.as_deref();
        while let Some(seg) = segment {
            depth += 1;
            segment = seg.parent.as_deref();
        }
        depth
    }

    /// Nodes appended at or after `from`, provided they are still in the private tail.
    pub fn appended_since(&self, from: usize) -> Option<&[N]> {
        if from < self.frozen_len {
            return None;
        }
        self.tail.get(from - self.frozen_len..)
    }

    /// Whether `self` and `other` share at least one frozen segment of history.
    pub fn shares_history_with(&self, other: &Structure<N>) -> bool {
        match (&self.frozen, &other.frozen) {
            (Some(a), Some(b)) => {
                let mut seg = Some(a);
                while let Some(s) = seg {
                    let mut other_seg = Some(b);
                    while let Some(o) = other_seg {
                        if Arc::ptr_eq(s, o) {
                            return true;
                        }
                        other_seg = o.parent.as_ref();
                    }
                    seg = s.parent.as_ref();
                }
                false
            }
            _ => false,
        }
    }

    /// Iterates nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &N> + '_ {
        let mut segments: Vec<&[N]> = Vec::new();
        let mut segment = self.frozen.as_deref();
        while let Some(seg) = segment {
            segments.push(&seg.nodes);
            segment = seg.parent.as_deref();
        }
        segments.reverse();
        segments
            .into_iter()
            .flat_map(|s| s.iter())
            .chain(self.tail.iter())
    }

    /// Iterates `(id, node)` pairs in insertion order.
    pub fn iter_with_ids(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
        self.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Discards everything and restarts from a single root node.
    pub fn reset(&mut self, root: N) {
        self.frozen = None;
        self.frozen_len = 0;
        self.tail.clear();
        self.tail.push(root);
    }
}

impl<N: Clone> Structure<N> {
    /// Copies all nodes into a flat vector.
    pub fn to_vec(&self) -> Vec<N> {
        self.iter().cloned().collect()
    }
}

impl<N: Clone> Clone for Structure<N> {
    fn clone(&self) -> Self {
        Self {
            frozen: self.frozen.clone(),
            frozen_len: self.frozen_len,
            tail: self.tail.clone(),
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for Structure<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
