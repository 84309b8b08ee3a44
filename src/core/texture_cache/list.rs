// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Intrusive doubly-linked lists over arena handles
//!
//! A cached source has to be a member of several lists at once: one list per
//! VRAM page its data touches, plus the list of its hash cache entry. Instead
//! of allocating a cell per membership, every owner embeds a fixed number of
//! [`ListNode`]s and each list threads through those nodes.
//!
//! Nodes never hold pointers. Neighbours are addressed by [`NodeRef`], which
//! names the owning arena entry and the node slot inside it, and nodes are
//! resolved through a [`NodeStore`] (normally the arena itself). Removing an
//! owner from the arena therefore cannot leave a dangling link, as long as
//! it is unlinked from its lists first.
//!
//! # Example
//!
//! ```
//! use psrx_texcache::core::texture_cache::list::{ListNode, NodeRef, NodeStore, TList};
//!
//! struct Item {
//!     nodes: [ListNode<usize, u8>; 2],
//! }
//!
//! struct Items(Vec<Item>);
//!
//! impl NodeStore<usize, u8> for Items {
//!     fn node(&self, at: NodeRef<usize>) -> &ListNode<usize, u8> {
//!         &self.0[at.owner].nodes[at.slot as usize]
//!     }
//!     fn node_mut(&mut self, at: NodeRef<usize>) -> &mut ListNode<usize, u8> {
//!         &mut self.0[at.owner].nodes[at.slot as usize]
//!     }
//! }
//!
//! let mut items = Items((0..2).map(|_| Item { nodes: Default::default() }).collect());
//! let mut evens = TList::new(0u8);
//! let mut all = TList::new(1u8);
//!
//! all.append(&mut items, NodeRef::new(0, 1));
//! all.append(&mut items, NodeRef::new(1, 1));
//! evens.append(&mut items, NodeRef::new(0, 0));
//!
//! assert_eq!(all.owners(&items), vec![0, 1]);
//! assert_eq!(evens.owners(&items), vec![0]);
//! ```

/// Reference to one node: the owning arena entry and the node slot in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef<K> {
    /// Arena handle of the owner
    pub owner: K,
    /// Index of the node inside the owner
    pub slot: u8,
}

impl<K> NodeRef<K> {
    pub const fn new(owner: K, slot: u8) -> Self {
        Self { owner, slot }
    }
}

/// Membership node embedded in a list owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListNode<K, L> {
    /// List this node is linked into, if any
    pub list: Option<L>,
    /// Previous node in the list
    pub prev: Option<NodeRef<K>>,
    /// Next node in the list
    pub next: Option<NodeRef<K>>,
}

impl<K, L> Default for ListNode<K, L> {
    fn default() -> Self {
        Self {
            list: None,
            prev: None,
            next: None,
        }
    }
}

impl<K, L> ListNode<K, L> {
    /// Whether the node is currently linked into a list
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.list.is_some()
    }
}

/// Resolves node references to the nodes embedded in their owners
pub trait NodeStore<K, L> {
    fn node(&self, at: NodeRef<K>) -> &ListNode<K, L>;
    fn node_mut(&mut self, at: NodeRef<K>) -> &mut ListNode<K, L>;
}

/// Head of an intrusive list
///
/// `L` identifies the list; nodes record it so that a node can be checked
/// against the list it is being removed from.
#[derive(Debug, Clone)]
pub struct TList<K, L> {
    id: L,
    head: Option<NodeRef<K>>,
    tail: Option<NodeRef<K>>,
    len: usize,
}

impl<K, L> TList<K, L>
where
    K: Copy + PartialEq,
    L: Copy + PartialEq + std::fmt::Debug,
{
    /// Create an empty list with the given identity
    pub fn new(id: L) -> Self {
        Self {
            id,
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> L {
        self.id
    }

    #[inline]
    pub fn head(&self) -> Option<NodeRef<K>> {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> Option<NodeRef<K>> {
        self.tail
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link `at` at the end of the list
    pub fn append<S: NodeStore<K, L> + ?Sized>(&mut self, store: &mut S, at: NodeRef<K>) {
        debug_assert!(!store.node(at).is_linked(), "node is already linked");
        {
            let node = store.node_mut(at);
            node.list = Some(self.id);
            node.prev = self.tail;
            node.next = None;
        }
        match self.tail {
            Some(tail) => store.node_mut(tail).next = Some(at),
            None => self.head = Some(at),
        }
        self.tail = Some(at);
        self.len += 1;
    }

    /// Link `at` at the front of the list
    pub fn prepend<S: NodeStore<K, L> + ?Sized>(&mut self, store: &mut S, at: NodeRef<K>) {
        debug_assert!(!store.node(at).is_linked(), "node is already linked");
        {
            let node = store.node_mut(at);
            node.list = Some(self.id);
            node.prev = None;
            node.next = self.head;
        }
        match self.head {
            Some(head) => store.node_mut(head).prev = Some(at),
            None => self.tail = Some(at),
        }
        self.head = Some(at);
        self.len += 1;
    }

    /// Unlink `at` from the list
    ///
    /// # Panics
    ///
    /// Panics if the node is linked into a different list.
    pub fn remove<S: NodeStore<K, L> + ?Sized>(&mut self, store: &mut S, at: NodeRef<K>) {
        let (prev, next) = {
            let node = store.node_mut(at);
            assert_eq!(
                node.list,
                Some(self.id),
                "node removed from a list it is not linked into"
            );
            let links = (node.prev, node.next);
            *node = ListNode::default();
            links
        };
        match prev {
            Some(prev) => store.node_mut(prev).next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => store.node_mut(next).prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    /// Move an already linked node to the front of the list
    pub fn move_to_front<S: NodeStore<K, L> + ?Sized>(&mut self, store: &mut S, at: NodeRef<K>) {
        if self.head == Some(at) {
            return;
        }
        self.remove(store, at);
        self.prepend(store, at);
    }

    /// Iterate over the node references from head to tail
    pub fn iter<'a, S: NodeStore<K, L> + ?Sized>(&self, store: &'a S) -> Iter<'a, K, L, S> {
        Iter {
            store,
            current: self.head,
            _list: std::marker::PhantomData,
        }
    }

    /// Snapshot of the owners in list order
    ///
    /// Use this when the walk destroys owners.
    pub fn owners<S: NodeStore<K, L> + ?Sized>(&self, store: &S) -> Vec<K> {
        self.iter(store).map(|at| at.owner).collect()
    }

    /// Forget all links without touching the nodes
    ///
    /// Only valid when every owner has been dropped from the arena, e.g.
    /// after the arena itself was cleared.
    pub fn reset(&mut self) {
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

/// Iterator over the nodes of a [`TList`]
pub struct Iter<'a, K, L, S: ?Sized> {
    store: &'a S,
    current: Option<NodeRef<K>>,
    _list: std::marker::PhantomData<L>,
}

impl<K, L, S> Iterator for Iter<'_, K, L, S>
where
    K: Copy,
    S: NodeStore<K, L> + ?Sized,
{
    type Item = NodeRef<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.current?;
        self.current = self.store.node(at).next;
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOTS: usize = 3;

    struct Owner {
        nodes: [ListNode<usize, u32>; SLOTS],
    }

    struct Store(Vec<Owner>);

    impl Store {
        fn with_owners(count: usize) -> Self {
            Self(
                (0..count)
                    .map(|_| Owner {
                        nodes: Default::default(),
                    })
                    .collect(),
            )
        }
    }

    impl NodeStore<usize, u32> for Store {
        fn node(&self, at: NodeRef<usize>) -> &ListNode<usize, u32> {
            &self.0[at.owner].nodes[at.slot as usize]
        }

        fn node_mut(&mut self, at: NodeRef<usize>) -> &mut ListNode<usize, u32> {
            &mut self.0[at.owner].nodes[at.slot as usize]
        }
    }

    fn check_links(list: &TList<usize, u32>, store: &Store) {
        let forward: Vec<_> = list.iter(store).collect();
        assert_eq!(forward.len(), list.len());
        let mut backward = Vec::new();
        let mut current = list.tail();
        while let Some(at) = current {
            backward.push(at);
            current = store.node(at).prev;
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_append_and_prepend_order() {
        let mut store = Store::with_owners(3);
        let mut list = TList::new(7);

        list.append(&mut store, NodeRef::new(1, 0));
        list.append(&mut store, NodeRef::new(2, 0));
        list.prepend(&mut store, NodeRef::new(0, 0));

        assert_eq!(list.owners(&store), vec![0, 1, 2]);
        assert_eq!(store.node(NodeRef::new(1, 0)).list, Some(7));
        check_links(&list, &store);
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let mut store = Store::with_owners(4);
        let mut list = TList::new(0);
        for owner in 0..4 {
            list.append(&mut store, NodeRef::new(owner, 1));
        }

        list.remove(&mut store, NodeRef::new(2, 1));
        assert_eq!(list.owners(&store), vec![0, 1, 3]);
        check_links(&list, &store);

        list.remove(&mut store, NodeRef::new(0, 1));
        assert_eq!(list.owners(&store), vec![1, 3]);
        check_links(&list, &store);

        list.remove(&mut store, NodeRef::new(3, 1));
        assert_eq!(list.owners(&store), vec![1]);
        check_links(&list, &store);

        list.remove(&mut store, NodeRef::new(1, 1));
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
        assert!(!store.node(NodeRef::new(1, 1)).is_linked());
    }

    #[test]
    fn test_one_owner_in_several_lists() {
        let mut store = Store::with_owners(2);
        let mut a = TList::new(1);
        let mut b = TList::new(2);
        let mut c = TList::new(3);

        a.append(&mut store, NodeRef::new(0, 0));
        b.append(&mut store, NodeRef::new(0, 1));
        c.append(&mut store, NodeRef::new(0, 2));
        b.append(&mut store, NodeRef::new(1, 1));

        b.remove(&mut store, NodeRef::new(0, 1));
        assert_eq!(a.owners(&store), vec![0]);
        assert_eq!(b.owners(&store), vec![1]);
        assert_eq!(c.owners(&store), vec![0]);
    }

    #[test]
    fn test_move_to_front() {
        let mut store = Store::with_owners(3);
        let mut list = TList::new(0);
        for owner in 0..3 {
            list.append(&mut store, NodeRef::new(owner, 0));
        }
        list.move_to_front(&mut store, NodeRef::new(2, 0));
        assert_eq!(list.owners(&store), vec![2, 0, 1]);
        check_links(&list, &store);

        list.move_to_front(&mut store, NodeRef::new(2, 0));
        assert_eq!(list.owners(&store), vec![2, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "not linked into")]
    fn test_remove_from_wrong_list_panics() {
        let mut store = Store::with_owners(1);
        let mut a = TList::new(1);
        let mut b = TList::new(2);
        a.append(&mut store, NodeRef::new(0, 0));
        b.remove(&mut store, NodeRef::new(0, 0));
    }
}
