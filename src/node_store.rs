//! NodeStore: per-bucket binary search trees over identifier strings.
//!
//! All nodes of a table live in one generational arena; each bucket is a
//! root link into it. Links are arena keys and every node is reachable
//! from exactly one parent link or bucket root, so removing a node from
//! the arena is the only way it is ever released.
//!
//! Trees are not rebalanced. Branch direction is byte-lexical `str`
//! ordering for both insert and lookup, so the two always agree on where
//! an identifier lives.

use crate::payload::{Kind, Payload};
use core::cmp::Ordering;
use slotmap::{DefaultKey, SlotMap};

/// Root or child link.
pub(crate) type Link = Option<DefaultKey>;

#[derive(Debug)]
pub(crate) struct Node {
    identifier: Box<str>,
    payload: Payload,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(identifier: &str, payload: Payload) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
            left: None,
            right: None,
        }
    }

    pub(crate) fn identifier(&self) -> &str {
        &self.identifier
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }
}

/// Outcome of `insert_or_update`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Upsert {
    Created(DefaultKey),
    /// The node already existed; its prior payload (of kind `prior`) has
    /// been released.
    Updated { key: DefaultKey, prior: Kind },
}

impl Upsert {
    pub(crate) fn key(&self) -> DefaultKey {
        match *self {
            Upsert::Created(key) | Upsert::Updated { key, .. } => key,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct NodeStore {
    nodes: SlotMap<DefaultKey, Node>,
}

impl NodeStore {
    pub(crate) fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, key: DefaultKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub(crate) fn node_mut(&mut self, key: DefaultKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Insert `identifier` under `root`, or replace the payload of the
    /// node already holding it.
    ///
    /// On replace, the prior payload is released with its own kind and
    /// destructor before this returns; the node keeps its key.
    pub(crate) fn insert_or_update(
        &mut self,
        root: &mut Link,
        identifier: &str,
        payload: Payload,
    ) -> Upsert {
        let mut parent: Option<(DefaultKey, Ordering)> = None;
        let mut cur = *root;
        while let Some(key) = cur {
            let node = &self.nodes[key];
            match identifier.cmp(node.identifier()) {
                Ordering::Equal => {
                    let node = &mut self.nodes[key];
                    let prior = core::mem::replace(&mut node.payload, payload);
                    let prior_kind = prior.kind();
                    drop(prior);
                    return Upsert::Updated {
                        key,
                        prior: prior_kind,
                    };
                }
                Ordering::Less => {
                    parent = Some((key, Ordering::Less));
                    cur = node.left;
                }
                Ordering::Greater => {
                    parent = Some((key, Ordering::Greater));
                    cur = node.right;
                }
            }
        }

        let key = self.nodes.insert(Node::leaf(identifier, payload));
        match parent {
            None => *root = Some(key),
            Some((p, Ordering::Less)) => self.nodes[p].left = Some(key),
            Some((p, _)) => self.nodes[p].right = Some(key),
        }
        Upsert::Created(key)
    }

    pub(crate) fn lookup(&self, root: Link, identifier: &str) -> Option<DefaultKey> {
        let mut cur = root;
        while let Some(key) = cur {
            let node = &self.nodes[key];
            cur = match identifier.cmp(node.identifier()) {
                Ordering::Equal => return Some(key),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        None
    }

    /// Release every node under `root` and clear it. For each node the
    /// payload goes first, then the identifier, then its subtrees.
    /// Returns the number of nodes released.
    pub(crate) fn teardown(&mut self, root: &mut Link) -> usize {
        let mut released = 0;
        let mut pending: Vec<DefaultKey> = root.take().into_iter().collect();
        while let Some(key) = pending.pop() {
            let Some(node) = self.nodes.remove(key) else {
                continue;
            };
            let Node {
                identifier,
                payload,
                left,
                right,
            } = node;
            drop(payload);
            drop(identifier);
            pending.extend(right);
            pending.extend(left);
            released += 1;
        }
        released
    }

    pub(crate) fn in_order(&self, root: Link) -> InOrder<'_> {
        InOrder {
            nodes: &self.nodes,
            stack: Vec::new(),
            cur: root,
        }
    }
}

/// In-order walk of one bucket's tree.
pub(crate) struct InOrder<'a> {
    nodes: &'a SlotMap<DefaultKey, Node>,
    stack: Vec<DefaultKey>,
    cur: Link,
}

impl<'a> Iterator for InOrder<'a> {
    type Item = (DefaultKey, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(key) = self.cur {
            self.stack.push(key);
            self.cur = self.nodes[key].left;
        }
        let key = self.stack.pop()?;
        let node = &self.nodes[key];
        self.cur = node.right;
        Some((key, node))
    }
}
