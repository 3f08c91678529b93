//! Arena holding the tree while the crawler grows it
//!
//! Frontier entries refer to their node by `NodeId`, so the tree has a single
//! owner during the crawl and no reference cycles. A queued page holds a
//! reserved slot at its link's position among its siblings; the slot only
//! becomes part of the tree once the page is fetched and handled.

use crate::tree::CrawlNode;

/// Index of a node inside a `CrawlArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

struct Slot {
    node: CrawlNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    reserved: bool,
}

/// Append-only tree storage used during a crawl
pub struct CrawlArena {
    slots: Vec<Slot>,
}

impl CrawlArena {
    /// Creates an arena containing only `root`
    pub fn with_root(mut root: CrawlNode) -> Self {
        root.children.clear();
        Self {
            slots: vec![Slot {
                node: root,
                parent: None,
                children: Vec::new(),
                reserved: false,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Appends `node` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, node: CrawlNode) -> NodeId {
        self.push_slot(parent, node, false)
    }

    /// Reserves the next child position of `parent` for `node`
    ///
    /// The node is left out of the finished tree unless [`confirm`] is called.
    ///
    /// [`confirm`]: CrawlArena::confirm
    pub fn reserve_child(&mut self, parent: NodeId, node: CrawlNode) -> NodeId {
        self.push_slot(parent, node, true)
    }

    /// Makes a reserved node part of the tree
    pub fn confirm(&mut self, id: NodeId) {
        self.slots[id.0].reserved = false;
    }

    fn push_slot(&mut self, parent: NodeId, mut node: CrawlNode, reserved: bool) -> NodeId {
        node.children.clear();
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            node,
            parent: Some(parent),
            children: Vec::new(),
            reserved,
        });
        self.slots[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> &CrawlNode {
        &self.slots[id.0].node
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut CrawlNode {
        &mut self.slots[id.0].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    /// Distance from the root (the root has depth 0)
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Converts the arena into an owned tree rooted at the arena root
    ///
    /// Children are always appended after their parent, so walking slots from
    /// last to first finishes every subtree before its parent needs it.
    /// Reservations that were never confirmed are dropped.
    pub fn into_tree(self) -> CrawlNode {
        let mut built: Vec<Option<CrawlNode>> = Vec::with_capacity(self.slots.len());
        let mut child_ids: Vec<Vec<NodeId>> = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            built.push((!slot.reserved).then_some(slot.node));
            child_ids.push(slot.children);
        }

        for index in (0..built.len()).rev() {
            let children: Vec<CrawlNode> = child_ids[index]
                .iter()
                .filter_map(|child| built[child.0].take())
                .collect();
            if let Some(node) = built[index].as_mut() {
                node.children = children;
            }
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| CrawlNode::new("", crate::tree::PageKind::LanguageRoot, ""))
    }
}
