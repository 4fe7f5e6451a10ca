//! Constraint tree model.
//!
//! The `definition` section of an archetype is a tree of object constraints
//! (`OBSERVATION[at0000]`, `ELEMENT[at0050]`, ...) connected through named
//! attributes (`data`, `events`, `items`, ...). Nodes live in an arena owned
//! by [`ConstraintTree`] and refer to their children by [`NodeId`], so a tree
//! can be shared read-only between threads without reference cycles.
//!
//! # Examples
//!
//! ```
//! use adl_types::{
//!     AttributeConstraint, ConstraintNode, ConstraintTree, Interval, NodeKind,
//!     ValueConstraint,
//! };
//!
//! let mut tree = ConstraintTree::builder();
//! let comment = tree.push(ConstraintNode::element(
//!     "ELEMENT",
//!     "at0100",
//!     Interval::optional(),
//!     ValueConstraint::FreeText,
//! ));
//! let root = tree.push(ConstraintNode::cluster(
//!     "CLUSTER",
//!     "at0000",
//!     Interval::required(),
//!     vec![AttributeConstraint::multiple("items", None, vec![comment])],
//! ));
//! let tree = tree.finish(root).unwrap();
//!
//! assert_eq!(tree.root_node().code, "at0000");
//! assert_eq!(tree.find_by_code("at0100"), Some(comment));
//! assert!(matches!(tree.root_node().kind, NodeKind::Cluster(_)));
//! ```

use std::collections::{HashMap, HashSet};

use crate::well_known::LOCAL_TERMINOLOGY;
use crate::{Cardinality, Interval, LocalCode};

/// Index of a node inside a [`ConstraintTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub usize);

/// One permissible entry of an ordinal value set: `3|[local::at0053]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodedOption {
    /// Declared ordinal.
    pub ordinal: u32,
    /// Terminology of the code (usually "local").
    pub terminology: String,
    /// The code itself.
    pub code: String,
}

impl CodedOption {
    /// Creates an option coded in the archetype's own ontology.
    pub fn local(ordinal: u32, code: impl Into<String>) -> Self {
        Self {
            ordinal,
            terminology: LOCAL_TERMINOLOGY.to_string(),
            code: code.into(),
        }
    }

    /// Returns true if the code resolves against the archetype ontology.
    pub fn is_local(&self) -> bool {
        self.terminology == LOCAL_TERMINOLOGY
    }
}

/// One `include`/`exclude` assertion of an archetype slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotAssertion {
    /// Path of the tested attribute, normally `archetype_id/value`.
    pub path: String,
    /// Regular expression the archetype id is matched against (unanchored text).
    pub pattern: String,
}

/// Constraint on the value carried by an element.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ValueConstraint {
    /// Ordinal value set (`DV_ORDINAL`).
    CodedChoice {
        /// Options in declaration order.
        options: Vec<CodedOption>,
    },
    /// Code list without ordinals (`DV_CODED_TEXT` defining code).
    CodePhrase {
        /// Terminology of the codes.
        terminology: String,
        /// Permitted codes in declaration order.
        codes: Vec<String>,
    },
    /// Any text (`DV_TEXT matches {*}`).
    FreeText,
    /// Reference to another archetype filling a slot.
    ExternalReference {
        /// Assertions an archetype id must satisfy.
        includes: Vec<SlotAssertion>,
        /// Assertions an archetype id must not satisfy.
        excludes: Vec<SlotAssertion>,
    },
    /// Unconstrained value, optionally restricted to a reference model type.
    Any {
        /// Reference model type name if one was declared.
        rm_type: Option<String>,
    },
}

impl ValueConstraint {
    /// Returns the local codes this constraint refers to.
    pub fn local_codes(&self) -> Vec<&str> {
        match self {
            Self::CodedChoice { options } => options
                .iter()
                .filter(|o| o.is_local())
                .map(|o| o.code.as_str())
                .collect(),
            Self::CodePhrase { terminology, codes } if terminology == LOCAL_TERMINOLOGY => {
                codes.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Returns true if this constraint fills a slot.
    pub fn is_slot(&self) -> bool {
        matches!(self, Self::ExternalReference { .. })
    }
}

/// A `use_node` reference: an attribute alternative that reuses the
/// constraint of a node declared elsewhere in the same tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InternalRef {
    /// Reference model type of the reused node.
    pub rm_type: String,
    /// Occurrences of the reference under this attribute.
    pub occurrences: Interval,
    /// Path of the reused node, e.g. `/data[at0001]/items[at0004]`.
    pub path: String,
    /// Code of the reused node, the last node id of `path`.
    pub target: LocalCode,
}

/// A named attribute of a container node and the objects allowed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeConstraint {
    /// Reference model attribute name (`data`, `events`, `items`).
    pub name: String,
    /// Declared existence, if any.
    pub existence: Option<Interval>,
    /// Cardinality; present only for multiple-valued attributes.
    pub cardinality: Option<Cardinality>,
    /// Allowed child objects in declaration order.
    pub children: Vec<NodeId>,
    /// `use_node` alternatives, after the children in declared order.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub references: Vec<InternalRef>,
}

impl AttributeConstraint {
    /// Creates a single-valued attribute.
    pub fn single(name: impl Into<String>, children: Vec<NodeId>) -> Self {
        Self {
            name: name.into(),
            existence: None,
            cardinality: None,
            children,
            references: Vec::new(),
        }
    }

    /// Creates a multiple-valued attribute.
    pub fn multiple(
        name: impl Into<String>,
        cardinality: Option<Cardinality>,
        children: Vec<NodeId>,
    ) -> Self {
        Self {
            name: name.into(),
            existence: None,
            cardinality: Some(
                cardinality.unwrap_or(Cardinality::unordered(Interval::unbounded())),
            ),
            children,
            references: Vec::new(),
        }
    }

    /// Returns true if the attribute holds a collection.
    pub fn is_multiple(&self) -> bool {
        self.cardinality.is_some()
    }
}

/// Kind of a constraint node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodeKind {
    /// Structural container (OBSERVATION, HISTORY, EVENT, ITEM_TREE, ...).
    Container(Vec<AttributeConstraint>),
    /// Nested group of elements (CLUSTER).
    Cluster(Vec<AttributeConstraint>),
    /// Leaf carrying a value, or an archetype slot.
    Element(ValueConstraint),
}

/// A node of the constraint tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintNode {
    /// Reference model type name, e.g. `ELEMENT`.
    pub rm_type: String,
    /// Local code naming this node, unique within the archetype.
    pub code: LocalCode,
    /// How many times this node may appear under its parent.
    pub occurrences: Interval,
    /// Node body.
    pub kind: NodeKind,
}

impl ConstraintNode {
    /// Creates a container node.
    pub fn container(
        rm_type: impl Into<String>,
        code: impl Into<String>,
        occurrences: Interval,
        attributes: Vec<AttributeConstraint>,
    ) -> Self {
        Self {
            rm_type: rm_type.into(),
            code: code.into(),
            occurrences,
            kind: NodeKind::Container(attributes),
        }
    }

    /// Creates a cluster node.
    pub fn cluster(
        rm_type: impl Into<String>,
        code: impl Into<String>,
        occurrences: Interval,
        attributes: Vec<AttributeConstraint>,
    ) -> Self {
        Self {
            rm_type: rm_type.into(),
            code: code.into(),
            occurrences,
            kind: NodeKind::Cluster(attributes),
        }
    }

    /// Creates an element node.
    pub fn element(
        rm_type: impl Into<String>,
        code: impl Into<String>,
        occurrences: Interval,
        value: ValueConstraint,
    ) -> Self {
        Self {
            rm_type: rm_type.into(),
            code: code.into(),
            occurrences,
            kind: NodeKind::Element(value),
        }
    }

    /// Returns the attributes of a container or cluster, empty for elements.
    pub fn attributes(&self) -> &[AttributeConstraint] {
        match &self.kind {
            NodeKind::Container(attributes) | NodeKind::Cluster(attributes) => attributes,
            NodeKind::Element(_) => &[],
        }
    }

    /// Returns the value constraint of an element.
    pub fn value(&self) -> Option<&ValueConstraint> {
        match &self.kind {
            NodeKind::Element(value) => Some(value),
            _ => None,
        }
    }
}

/// Error raised when assembling a constraint tree that breaks its invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Two nodes share a local code.
    DuplicateCode(LocalCode),
    /// A child index does not refer to a node of the arena.
    DanglingChild(NodeId),
    /// A node is referenced by more than one parent, or the root is a child.
    NotATree(NodeId),
    /// The root index does not refer to a node of the arena.
    MissingRoot(NodeId),
    /// A `use_node` reference names a code no node is declared with.
    DanglingReference(LocalCode),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateCode(code) => write!(f, "duplicate node code '{}'", code),
            Self::DanglingChild(id) => write!(f, "child node {} does not exist", id.0),
            Self::NotATree(id) => write!(f, "node {} has more than one parent", id.0),
            Self::MissingRoot(id) => write!(f, "root node {} does not exist", id.0),
            Self::DanglingReference(code) => {
                write!(f, "use_node target '{}' is not declared", code)
            }
        }
    }
}

impl std::error::Error for TreeError {}

/// Builder collecting nodes bottom-up before the tree is sealed.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<ConstraintNode>,
}

impl TreeBuilder {
    /// Adds a node and returns its index.
    pub fn push(&mut self, node: ConstraintNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Returns the number of nodes pushed so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node has been pushed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Seals the tree, checking that codes are unique, every node but the
    /// root has exactly one parent, and every `use_node` target exists.
    pub fn finish(self, root: NodeId) -> Result<ConstraintTree, TreeError> {
        if root.0 >= self.nodes.len() {
            return Err(TreeError::MissingRoot(root));
        }

        let mut by_code = HashMap::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            if by_code.insert(node.code.clone(), NodeId(index)).is_some() {
                return Err(TreeError::DuplicateCode(node.code.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(self.nodes.len());
        seen.insert(root);
        for node in &self.nodes {
            for attribute in node.attributes() {
                for &child in &attribute.children {
                    if child.0 >= self.nodes.len() {
                        return Err(TreeError::DanglingChild(child));
                    }
                    if !seen.insert(child) {
                        return Err(TreeError::NotATree(child));
                    }
                }
                for reference in &attribute.references {
                    if !by_code.contains_key(&reference.target) {
                        return Err(TreeError::DanglingReference(reference.target.clone()));
                    }
                }
            }
        }

        Ok(ConstraintTree {
            nodes: self.nodes,
            root,
            by_code,
        })
    }
}

/// Immutable arena of constraint nodes rooted at exactly one node.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConstraintTree {
    nodes: Vec<ConstraintNode>,
    root: NodeId,
    #[cfg_attr(feature = "serde", serde(skip))]
    by_code: HashMap<LocalCode, NodeId>,
}

impl ConstraintTree {
    /// Starts building a new tree.
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    /// Returns the root index.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root node.
    pub fn root_node(&self) -> &ConstraintNode {
        &self.nodes[self.root.0]
    }

    /// Returns a node by index.
    pub fn get(&self, id: NodeId) -> Option<&ConstraintNode> {
        self.nodes.get(id.0)
    }

    /// Finds the node declared with the given local code.
    pub fn find_by_code(&self, code: &str) -> Option<NodeId> {
        self.by_code.get(code).copied()
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree holds no nodes (never true for a finished tree).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ConstraintNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Returns every local code referenced by a node or a value set, root first.
    pub fn referenced_codes(&self) -> Vec<&str> {
        let mut codes = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            codes.push(node.code.as_str());
            match &node.kind {
                NodeKind::Element(value) => codes.extend(value.local_codes()),
                NodeKind::Container(attributes) | NodeKind::Cluster(attributes) => {
                    for attribute in attributes.iter().rev() {
                        stack.extend(attribute.children.iter().rev());
                    }
                }
            }
        }
        codes
    }
}

/// Trees are equal when their shapes, codes, ranges and value sets are equal,
/// regardless of the arena order the nodes were pushed in.
impl PartialEq for ConstraintTree {
    fn eq(&self, other: &Self) -> bool {
        subtree_eq(self, self.root, other, other.root)
    }
}

impl Eq for ConstraintTree {}

fn subtree_eq(a: &ConstraintTree, a_id: NodeId, b: &ConstraintTree, b_id: NodeId) -> bool {
    let (x, y) = match (a.get(a_id), b.get(b_id)) {
        (Some(x), Some(y)) => (x, y),
        _ => return false,
    };

    if x.rm_type != y.rm_type || x.code != y.code || x.occurrences != y.occurrences {
        return false;
    }

    match (&x.kind, &y.kind) {
        (NodeKind::Element(vx), NodeKind::Element(vy)) => vx == vy,
        (NodeKind::Container(ax), NodeKind::Container(ay))
        | (NodeKind::Cluster(ax), NodeKind::Cluster(ay)) => {
            ax.len() == ay.len()
                && ax.iter().zip(ay).all(|(p, q)| {
                    p.name == q.name
                        && p.existence == q.existence
                        && p.cardinality == q.cardinality
                        && p.references == q.references
                        && p.children.len() == q.children.len()
                        && p.children
                            .iter()
                            .zip(&q.children)
                            .all(|(&c, &d)| subtree_eq(a, c, b, d))
                })
        }
        _ => false,
    }
}
