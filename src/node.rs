use std::collections::BTreeMap;
use std::fmt;

use crate::error::InvariantViolation;

/// Identifier of a node, assigned in document order. The root is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(1);

    pub fn get(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element kinds the renderer distinguishes, resolved once from the tag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    /// The synthetic wrapper around every document
    Root,
    Paragraph,
    Heading(u8),
    List { ordered: bool },
    ListItem,
    Anchor,
    LineBreak,
    Other(String),
}

impl Tag {
    /// Classify a lowercased tag name. Never yields `Tag::Root`; only the
    /// parser's wrapper is the root.
    pub fn from_name(name: &str) -> Tag {
        match name {
            "p" => Tag::Paragraph,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::List { ordered: false },
            "ol" => Tag::List { ordered: true },
            "li" => Tag::ListItem,
            "a" => Tag::Anchor,
            "br" => Tag::LineBreak,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Void elements never receive children.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::LineBreak)
    }

    /// Block elements are separated from their surroundings by a blank line.
    pub fn is_block(&self) -> bool {
        matches!(self, Tag::Paragraph | Tag::Heading(_) | Tag::List { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub tag: Tag,
    pub attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(name: &str, attributes: BTreeMap<String, String>) -> Self {
        let name = name.to_ascii_lowercase();
        Self {
            tag: Tag::from_name(&name),
            name,
            attributes,
        }
    }

    pub(crate) fn root() -> Self {
        Self {
            name: "root".to_string(),
            tag: Tag::Root,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            NodeKind::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element(_) => None,
        }
    }

    /// Whether content must never be attached under this node.
    pub fn is_leaf_only(&self) -> bool {
        match &self.kind {
            NodeKind::Text(_) => true,
            NodeKind::Element(element) => element.tag.is_void(),
        }
    }
}

/// Node arena. Nodes are stored in creation order, which is also pre-order,
/// and each node records its single parent.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// A tree holding only the synthetic root.
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: NodeId::ROOT,
                kind: NodeKind::Element(Element::root()),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Create a node and append it as the last child of `parent`.
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32 + 1);
        self.nodes.push(Node {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Panics if `id` was not issued by this tree.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from the start. Kept so `len` comes
    /// with the usual collection pair.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get(id).parent.map(|parent| self.get(parent))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> + '_ {
        self.get(id).children.iter().map(|&child| self.get(child))
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).children.last().copied()
    }

    /// Pre-order traversal of the whole tree, root first.
    pub fn iter(&self) -> Descendants<'_> {
        self.descendants(NodeId::ROOT)
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Check the structural invariants the parser maintains.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut owners = vec![0usize; self.nodes.len()];

        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(InvariantViolation::new(node.id, "id does not match arena slot"));
            }
            if node.is_leaf_only() && !node.children.is_empty() {
                return Err(InvariantViolation::new(node.id, "leaf node has children"));
            }
            for &child in &node.children {
                let Some(slot) = owners.get_mut(child.index()) else {
                    return Err(InvariantViolation::new(child, "child id out of range"));
                };
                *slot += 1;
                if self.nodes[child.index()].parent != Some(node.id) {
                    return Err(InvariantViolation::new(child, "parent index disagrees with owner"));
                }
            }
        }

        for (index, &count) in owners.iter().enumerate() {
            let node = &self.nodes[index];
            match (node.id == NodeId::ROOT, count) {
                (true, 0) if node.parent.is_none() => {}
                (true, _) => return Err(InvariantViolation::new(node.id, "root has a parent")),
                (false, 0) => return Err(InvariantViolation::new(node.id, "orphan")),
                (false, 1) => {}
                (false, _) => return Err(InvariantViolation::new(node.id, "multiple parents")),
            }
        }

        let mut previous = 0;
        for node in self.iter() {
            if node.id.get() <= previous {
                return Err(InvariantViolation::new(node.id, "ids out of document order"));
            }
            previous = node.id.get();
        }

        Ok(())
    }
}

/// Iterative pre-order walk, children visited left to right.
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id);
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match &node.kind {
                NodeKind::Element(element) => write!(f, "{}: {}", node.id, element.name)?,
                NodeKind::Text(text) => write!(f, "{}: {}", node.id, text)?,
            }
        }
        Ok(())
    }
}
