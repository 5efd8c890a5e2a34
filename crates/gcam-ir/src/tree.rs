//! Block tree engine.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Every node is
//! linked into at most one list; lists are addressed by [`ListId`] and may
//! be owned by a node (the child list of a container). A list is a plain
//! doubly-linked chain: the head has no `prev`, the tail has no `next`.
//!
//! All link operations are O(1). Destruction and traversal are O(n).

use slotmap::{new_key_type, Key, SlotMap};

new_key_type! {
    /// Stable handle of a node in a [`Tree`].
    pub struct NodeId;
    /// Stable handle of a list in a [`Tree`].
    pub struct ListId;
}

/// Behavior the engine needs from the items it stores.
pub trait TreeItem {
    /// Locked items refuse removal and reordering.
    fn is_locked(&self) -> bool;
}

#[derive(Debug, Clone)]
struct Node<T> {
    item: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    list: Option<ListId>,
    /// Lists owned by this node, destroyed together with it.
    lists: Vec<ListId>,
}

#[derive(Debug, Clone, Default)]
struct ListSlot {
    head: Option<NodeId>,
    tail: Option<NodeId>,
    owner: Option<NodeId>,
    len: usize,
}

/// An arena of intrusively linked nodes organized into lists.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: SlotMap<NodeId, Node<T>>,
    lists: SlotMap<ListId, ListSlot>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            lists: SlotMap::with_key(),
        }
    }
}

impl<T: TreeItem> Tree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty list, optionally owned by `owner`.
    ///
    /// An owned list is destroyed when its owner is destroyed and its
    /// members report `owner` as their parent.
    pub fn new_list(&mut self, owner: Option<NodeId>) -> ListId {
        let owner = owner.filter(|o| self.nodes.contains_key(*o));
        let list = self.lists.insert(ListSlot {
            owner,
            ..ListSlot::default()
        });
        if let Some(node) = owner.and_then(|o| self.nodes.get_mut(o)) {
            node.lists.push(list);
        }
        list
    }

    /// Store a new, unlinked node.
    pub fn create(&mut self, item: T) -> NodeId {
        self.nodes.insert(Node {
            item,
            prev: None,
            next: None,
            list: None,
            lists: Vec::new(),
        })
    }

    /// Number of live nodes, linked or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node's item.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id).map(|n| &n.item)
    }

    /// Mutably borrow a node's item.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id).map(|n| &mut n.item)
    }

    /// Stable numeric identifier for external correlation (e.g. picking).
    pub fn handle(&self, id: NodeId) -> u64 {
        id.data().as_ffi()
    }

    /// First node of `list`.
    pub fn head(&self, list: ListId) -> Option<NodeId> {
        self.lists.get(list).and_then(|l| l.head)
    }

    /// Last node of `list`.
    pub fn tail(&self, list: ListId) -> Option<NodeId> {
        self.lists.get(list).and_then(|l| l.tail)
    }

    /// Number of nodes linked into `list`.
    pub fn list_len(&self, list: ListId) -> usize {
        self.lists.get(list).map_or(0, |l| l.len)
    }

    /// Next sibling.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.next)
    }

    /// Previous sibling.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.prev)
    }

    /// List that currently holds `id`.
    pub fn list_of(&self, id: NodeId) -> Option<ListId> {
        self.nodes.get(id).and_then(|n| n.list)
    }

    /// Owner of `list`, if it is a child list.
    pub fn owner(&self, list: ListId) -> Option<NodeId> {
        self.lists.get(list).and_then(|l| l.owner)
    }

    /// Container node whose child list holds `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.list_of(id).and_then(|l| self.owner(l))
    }

    /// Lists owned by `id`, in creation order.
    pub fn child_lists(&self, id: NodeId) -> &[ListId] {
        self.nodes.get(id).map_or(&[], |n| n.lists.as_slice())
    }

    /// Iterate the node ids of `list` from head to tail.
    pub fn iter(&self, list: ListId) -> Iter<'_, T> {
        Iter {
            tree: self,
            cursor: self.head(list),
        }
    }

    /// Snapshot of the node ids of `list`.
    pub fn ids(&self, list: ListId) -> Vec<NodeId> {
        self.iter(list).collect()
    }

    fn is_locked(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.item.is_locked())
    }

    /// Insert `id` right after the head of `list`; into an empty list the
    /// node becomes the head. A node linked elsewhere is detached first.
    pub fn insert(&mut self, list: ListId, id: NodeId) -> bool {
        if !self.nodes.contains_key(id) || !self.lists.contains_key(list) {
            return false;
        }
        match self.head(list) {
            Some(head) if head != id => self.insert_after(head, id),
            Some(_) => true,
            None => {
                self.splice(id);
                self.link_only(list, id);
                true
            }
        }
    }

    /// Insert `id` directly after `anchor`, in whatever list holds `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, id: NodeId) -> bool {
        if anchor == id || !self.nodes.contains_key(id) {
            return false;
        }
        let Some(list) = self.list_of(anchor) else {
            return false;
        };
        self.splice(id);
        let next = self.nodes[anchor].next;
        {
            let node = &mut self.nodes[id];
            node.prev = Some(anchor);
            node.next = next;
            node.list = Some(list);
        }
        self.nodes[anchor].next = Some(id);
        match next {
            Some(n) => self.nodes[n].prev = Some(id),
            None => self.lists[list].tail = Some(id),
        }
        self.lists[list].len += 1;
        true
    }

    /// Append `id` at the tail of `list`.
    pub fn push_back(&mut self, list: ListId, id: NodeId) -> bool {
        if !self.nodes.contains_key(id) || !self.lists.contains_key(list) {
            return false;
        }
        match self.tail(list) {
            Some(tail) if tail != id => self.insert_after(tail, id),
            Some(_) => true,
            None => {
                self.splice(id);
                self.link_only(list, id);
                true
            }
        }
    }

    fn link_only(&mut self, list: ListId, id: NodeId) {
        let node = &mut self.nodes[id];
        node.prev = None;
        node.next = None;
        node.list = Some(list);
        let slot = &mut self.lists[list];
        slot.head = Some(id);
        slot.tail = Some(id);
        slot.len = 1;
    }

    /// Detach `id` from its list without destroying it.
    ///
    /// Returns `false` if the node was not linked.
    pub fn splice(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let Some(list) = node.list.take() else {
            return false;
        };
        let prev = node.prev.take();
        let next = node.next.take();

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.lists[list].head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.lists[list].tail = prev,
        }
        self.lists[list].len -= 1;
        true
    }

    /// Unlink and destroy `id` together with every list it owns.
    ///
    /// A locked node is left untouched and `None` is returned.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        if self.is_locked(id) {
            return None;
        }
        self.destroy(id)
    }

    fn destroy(&mut self, id: NodeId) -> Option<T> {
        self.splice(id);
        let node = self.nodes.remove(id)?;
        for list in node.lists {
            self.destroy_list(list);
            self.lists.remove(list);
        }
        Some(node.item)
    }

    /// Destroy every node of `list`, locked or not, leaving it empty.
    pub fn destroy_list(&mut self, list: ListId) {
        while let Some(head) = self.head(list) {
            self.destroy(head);
        }
    }

    /// Swap `id` with its previous sibling.
    ///
    /// Refused (returns `false`) at the head or when either node is locked.
    pub fn move_toward_head(&mut self, id: NodeId) -> bool {
        match self.prev(id) {
            Some(prev) => self.swap_adjacent(prev, id),
            None => false,
        }
    }

    /// Swap `id` with its next sibling.
    ///
    /// Refused (returns `false`) at the tail or when either node is locked.
    pub fn move_toward_tail(&mut self, id: NodeId) -> bool {
        match self.next(id) {
            Some(next) => self.swap_adjacent(id, next),
            None => false,
        }
    }

    /// Swap two adjacent nodes where `a.next == b`.
    fn swap_adjacent(&mut self, a: NodeId, b: NodeId) -> bool {
        if self.is_locked(a) || self.is_locked(b) {
            return false;
        }
        let Some(list) = self.list_of(a) else {
            return false;
        };
        let before = self.nodes[a].prev;
        let after = self.nodes[b].next;

        match before {
            Some(p) => self.nodes[p].next = Some(b),
            None => self.lists[list].head = Some(b),
        }
        match after {
            Some(n) => self.nodes[n].prev = Some(a),
            None => self.lists[list].tail = Some(a),
        }
        {
            let nb = &mut self.nodes[b];
            nb.prev = before;
            nb.next = Some(a);
        }
        let na = &mut self.nodes[a];
        na.prev = Some(b);
        na.next = after;
        true
    }

    /// Deep-copy `id` and all of its child lists using `clone_item` for
    /// every payload. The copy is unlinked; copied children are re-parented
    /// under the new node.
    pub fn duplicate_with<F>(&mut self, id: NodeId, clone_item: &mut F) -> Option<NodeId>
    where
        F: FnMut(&T) -> T,
    {
        let item = clone_item(&self.nodes.get(id)?.item);
        let copy = self.create(item);
        for list in self.nodes[id].lists.clone() {
            let copied_list = self.new_list(Some(copy));
            for child in self.ids(list) {
                if let Some(c) = self.duplicate_with(child, clone_item) {
                    self.push_back(copied_list, c);
                }
            }
        }
        Some(copy)
    }

    /// Check the chain invariants of `list`: acyclic, head/tail ends
    /// open, back-links consistent, every member pointing at `list`,
    /// and the recorded length matching.
    pub fn validate(&self, list: ListId) -> bool {
        let Some(slot) = self.lists.get(list) else {
            return false;
        };
        let mut prev: Option<NodeId> = None;
        let mut cursor = slot.head;
        let mut count = 0usize;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id) else {
                return false;
            };
            if node.prev != prev || node.list != Some(list) {
                return false;
            }
            count += 1;
            if count > self.nodes.len() {
                return false;
            }
            prev = Some(id);
            cursor = node.next;
        }
        slot.tail == prev && slot.len == count
    }
}

impl<T: TreeItem + Clone> Tree<T> {
    /// Deep-copy `id` and its child lists by cloning each payload.
    pub fn duplicate(&mut self, id: NodeId) -> Option<NodeId> {
        self.duplicate_with(id, &mut |item: &T| item.clone())
    }
}

/// Iterator over the node ids of a list.
pub struct Iter<'a, T> {
    tree: &'a Tree<T>,
    cursor: Option<NodeId>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.cursor?;
        self.cursor = self.tree.nodes.get(id).and_then(|n| n.next);
        Some(id)
    }
}
