use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::question::{Question, QuestionSet};
use crate::error::{HtkError, Result};

// ---------------------------------------------------------------------------
// StreamSpec – which state / stream a tree belongs to
// ---------------------------------------------------------------------------

/// The line naming a tree, e.g. `mgc_s2[2]` or `{*}[3]`.
///
/// Kept verbatim so files re-serialise unchanged; the state index and stream
/// name are parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamSpec(String);

impl StreamSpec {
    /// A stream spec is one non-empty token that cannot be mistaken for a
    /// question line, a brace, a leaf, or a comment.
    pub fn new(spec: impl Into<String>) -> Result<Self> {
        let spec = spec.into();
        let reserved = matches!(spec.as_str(), "QS" | "{" | "}")
            || spec.starts_with('"')
            || spec.starts_with('#');
        if spec.is_empty() || spec.chars().any(char::is_whitespace) || reserved {
            return Err(HtkError::structure(format!(
                "invalid stream spec `{spec}`"
            )));
        }
        Ok(Self(spec))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the trailing `[state]`, e.g. `mgc_s2` or `{*}`.
    pub fn name(&self) -> &str {
        match self.bracket() {
            Some((name, _)) => name,
            None => &self.0,
        }
    }

    /// The trailing `[state]` index, if present and numeric.
    pub fn state(&self) -> Option<u32> {
        self.bracket().and_then(|(_, state)| state.parse().ok())
    }

    fn bracket(&self) -> Option<(&str, &str)> {
        let body = self.0.strip_suffix(']')?;
        let open = body.rfind('[')?;
        Some((&body[..open], &body[open + 1..]))
    }
}

impl TryFrom<String> for StreamSpec {
    type Error = HtkError;

    fn try_from(spec: String) -> Result<Self> {
        StreamSpec::new(spec)
    }
}

impl From<StreamSpec> for String {
    fn from(spec: StreamSpec) -> Self {
        spec.0
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Index of a node in a tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Terminal payload: a macro identifier, a numeric vector, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
    pub macro_id: Option<String>,
    pub values: Option<Vec<f64>>,
}

impl LeafNode {
    /// Leaf naming a model macro, e.g. `mgc_s2_12`.
    pub fn macro_id(id: impl Into<String>) -> Self {
        Self {
            macro_id: Some(id.into()),
            values: None,
        }
    }

    /// Leaf carrying only numbers.
    pub fn values(values: Vec<f64>) -> Self {
        Self {
            macro_id: None,
            values: Some(values),
        }
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = Some(values);
        self
    }

    /// Check the leaf can be written as a single field and read back.
    pub fn validate(&self) -> Result<()> {
        match self.problem() {
            Some(message) => Err(HtkError::structure(message)),
            None => Ok(()),
        }
    }

    fn problem(&self) -> Option<String> {
        if let Some(id) = &self.macro_id {
            if id.is_empty() {
                return Some("leaf macro id is empty".to_string());
            }
            if id.contains(|c: char| c.is_whitespace() || c == '"') {
                return Some(format!("leaf macro id `{id}` contains whitespace or a quote"));
            }
        }
        match &self.values {
            Some(values) if values.is_empty() => Some("leaf has an empty value list".to_string()),
            None if self.macro_id.is_none() => {
                Some("leaf has neither a macro id nor values".to_string())
            }
            _ => None,
        }
    }
}

/// A split on a question. The first child answers "no", the second "yes".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalNode {
    /// Record number used in the file; the root is 0.
    pub index: i64,
    /// Name of the question, resolved against a [`QuestionSet`].
    pub question: String,
    pub no: NodeId,
    pub yes: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Internal(InternalNode),
    Leaf(LeafNode),
}

// ---------------------------------------------------------------------------
// Flat records – the shape of the on-disk node table
// ---------------------------------------------------------------------------

/// A child reference in a node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChildRef {
    /// Another record, by index.
    Split(i64),
    Leaf(LeafNode),
}

/// One line of a node table: `index question no-child yes-child`.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord {
    pub index: i64,
    pub question: String,
    pub no: ChildRef,
    pub yes: ChildRef,
    /// Source line, used to position structure errors.
    pub line: Option<usize>,
}

impl SplitRecord {
    fn error(&self, message: impl Into<String>) -> HtkError {
        match self.line {
            Some(line) => HtkError::structure_at(line, message),
            None => HtkError::structure(message),
        }
    }

    fn check_question(&self) -> Result<()> {
        let name = &self.question;
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '"') {
            return Err(self.error(format!(
                "node {} has an invalid question name `{name}`",
                self.index
            )));
        }
        Ok(())
    }
}

/// Owned recursive form, convenient for building trees by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        question: String,
        no: Box<Node>,
        yes: Box<Node>,
    },
    Leaf(LeafNode),
}

impl Node {
    pub fn split(question: impl Into<String>, no: Node, yes: Node) -> Self {
        Node::Split {
            question: question.into(),
            no: Box::new(no),
            yes: Box::new(yes),
        }
    }

    pub fn leaf(id: impl Into<String>) -> Self {
        Node::Leaf(LeafNode::macro_id(id))
    }
}

// ---------------------------------------------------------------------------
// DecisionTree – arena of nodes rooted at one entry
// ---------------------------------------------------------------------------

/// A binary decision tree for one stream / state.
///
/// Nodes live in an arena. Internal nodes come first, in record order (file
/// order for parsed trees, pre-order for trees built with
/// [`DecisionTree::from_root`]); leaves follow in the order the records
/// mention them. Two trees built from the same records are therefore equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeArena", into = "TreeArena")]
pub struct DecisionTree {
    stream: StreamSpec,
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl DecisionTree {
    /// A degenerate tree whose root is a leaf.
    pub fn leaf(stream: StreamSpec, leaf: LeafNode) -> Result<Self> {
        if let Some(problem) = leaf.problem() {
            return Err(HtkError::structure(format!("tree {stream}: {problem}")));
        }
        Ok(Self {
            stream,
            nodes: vec![TreeNode::Leaf(leaf)],
            root: NodeId(0),
        })
    }

    /// Build a tree from a flat node table.
    ///
    /// The table must describe exactly one binary tree rooted at index 0:
    /// unique indices, every referenced index defined, no node with two
    /// parents, the root never a child, and every record reachable.
    pub fn from_records(stream: StreamSpec, records: Vec<SplitRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(HtkError::structure(format!(
                "tree {stream} has an empty node table"
            )));
        }

        let mut position: HashMap<i64, usize> = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if position.insert(record.index, pos).is_some() {
                return Err(record.error(format!("node {} defined twice", record.index)));
            }
        }
        let root = *position.get(&0).ok_or_else(|| {
            HtkError::structure(format!("tree {stream} has no root node 0"))
        })?;

        let split_count = records.len();
        let mut parent: Vec<Option<i64>> = vec![None; split_count];
        let mut leaves: Vec<TreeNode> = Vec::with_capacity(split_count + 1);
        let mut internals: Vec<TreeNode> = Vec::with_capacity(split_count);

        for record in records {
            record.check_question()?;
            let mut resolve = |child: ChildRef| -> Result<NodeId> {
                match child {
                    ChildRef::Leaf(leaf) => {
                        if let Some(problem) = leaf.problem() {
                            return Err(record.error(format!("node {}: {problem}", record.index)));
                        }
                        leaves.push(TreeNode::Leaf(leaf));
                        Ok(NodeId(split_count + leaves.len() - 1))
                    }
                    ChildRef::Split(index) => {
                        let pos = *position.get(&index).ok_or_else(|| {
                            record.error(format!(
                                "node {} refers to undefined node {index}",
                                record.index
                            ))
                        })?;
                        if pos == root {
                            return Err(record.error(format!(
                                "root node 0 is referenced as a child of node {}",
                                record.index
                            )));
                        }
                        if let Some(other) = parent[pos] {
                            return Err(record.error(format!(
                                "node {index} is referenced by both node {other} and node {}",
                                record.index
                            )));
                        }
                        parent[pos] = Some(record.index);
                        Ok(NodeId(pos))
                    }
                }
            };
            let no = resolve(record.no.clone())?;
            let yes = resolve(record.yes.clone())?;
            internals.push(TreeNode::Internal(InternalNode {
                index: record.index,
                question: record.question,
                no,
                yes,
            }));
        }

        let mut nodes = internals;
        nodes.extend(leaves);
        let tree = Self {
            stream,
            nodes,
            root: NodeId(root),
        };

        let mut reached = vec![false; split_count];
        for (id, _) in tree.preorder() {
            if id.0 < split_count {
                reached[id.0] = true;
            }
        }
        let unreachable: Vec<String> = tree
            .internal_nodes()
            .zip(&reached)
            .filter(|(_, &seen)| !seen)
            .map(|(node, _)| node.index.to_string())
            .collect();
        if !unreachable.is_empty() {
            return Err(HtkError::structure(format!(
                "tree {} has nodes unreachable from the root: {}",
                tree.stream,
                unreachable.join(", ")
            )));
        }
        Ok(tree)
    }

    /// Build a tree from its owned recursive form.
    ///
    /// Internal nodes are numbered in pre-order, `0, -1, -2, ...`, the HTS
    /// convention. Conversion uses an explicit stack.
    pub fn from_root(stream: StreamSpec, root: Node) -> Result<Self> {
        let (question, no, yes) = match root {
            Node::Leaf(leaf) => return Self::leaf(stream, leaf),
            Node::Split { question, no, yes } => (question, no, yes),
        };

        struct Pending {
            index: i64,
            question: String,
            no: Option<ChildRef>,
            yes: Option<ChildRef>,
        }

        let mut pending = vec![Pending {
            index: 0,
            question,
            no: None,
            yes: None,
        }];
        let mut next_index = -1i64;
        // (node, owning record position, is the yes branch)
        let mut stack: Vec<(Node, usize, bool)> = vec![(*yes, 0, true), (*no, 0, false)];

        while let Some((node, owner, is_yes)) = stack.pop() {
            let child = match node {
                Node::Leaf(leaf) => ChildRef::Leaf(leaf),
                Node::Split { question, no, yes } => {
                    let index = next_index;
                    next_index -= 1;
                    let pos = pending.len();
                    pending.push(Pending {
                        index,
                        question,
                        no: None,
                        yes: None,
                    });
                    stack.push((*yes, pos, true));
                    stack.push((*no, pos, false));
                    ChildRef::Split(index)
                }
            };
            let slot = &mut pending[owner];
            if is_yes {
                slot.yes = Some(child);
            } else {
                slot.no = Some(child);
            }
        }

        let records = pending
            .into_iter()
            .map(|p| {
                let index = p.index;
                let missing = || HtkError::structure(format!("node {index} is missing a child"));
                Ok(SplitRecord {
                    index,
                    question: p.question,
                    no: p.no.ok_or_else(missing)?,
                    yes: p.yes.ok_or_else(missing)?,
                    line: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(stream, records)
    }

    /// Flatten back into node records, in arena order.
    ///
    /// Empty for a degenerate single-leaf tree.
    pub fn records(&self) -> Vec<SplitRecord> {
        self.internal_nodes()
            .map(|node| SplitRecord {
                index: node.index,
                question: node.question.clone(),
                no: self.child_ref(node.no),
                yes: self.child_ref(node.yes),
                line: None,
            })
            .collect()
    }

    fn child_ref(&self, id: NodeId) -> ChildRef {
        match &self.nodes[id.0] {
            TreeNode::Internal(node) => ChildRef::Split(node.index),
            TreeNode::Leaf(leaf) => ChildRef::Leaf(leaf.clone()),
        }
    }

    pub fn stream(&self) -> &StreamSpec {
        &self.stream
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    /// The internal node at `id`, or `None` if it is a leaf.
    pub fn internal(&self, id: NodeId) -> Option<&InternalNode> {
        match self.nodes.get(id.0)? {
            TreeNode::Internal(node) => Some(node),
            TreeNode::Leaf(_) => None,
        }
    }

    /// Whether the whole tree is a single leaf.
    pub fn is_degenerate(&self) -> bool {
        matches!(self.nodes[self.root.0], TreeNode::Leaf(_))
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Internal nodes in arena (record) order.
    pub fn internal_nodes(&self) -> impl Iterator<Item = &InternalNode> {
        self.nodes.iter().filter_map(|n| match n {
            TreeNode::Internal(node) => Some(node),
            TreeNode::Leaf(_) => None,
        })
    }

    /// Pre-order traversal: each node before its "no" subtree, then its
    /// "yes" subtree.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Breadth-first traversal with the depth of each node (root at 0).
    pub fn breadth_first(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut agenda = VecDeque::from([(self.root, 0usize)]);
        while let Some((id, depth)) = agenda.pop_front() {
            out.push((id, depth));
            if let TreeNode::Internal(node) = &self.nodes[id.0] {
                agenda.push_back((node.no, depth + 1));
                agenda.push_back((node.yes, depth + 1));
            }
        }
        out
    }

    /// Leaves in breadth-first order.
    pub fn leaves(&self) -> Vec<&LeafNode> {
        self.breadth_first()
            .into_iter()
            .filter_map(|(id, _)| match &self.nodes[id.0] {
                TreeNode::Leaf(leaf) => Some(leaf),
                TreeNode::Internal(_) => None,
            })
            .collect()
    }

    /// Length of the longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        self.breadth_first()
            .into_iter()
            .map(|(_, depth)| depth)
            .max()
            .unwrap_or(0)
    }

    /// The question asked at an internal node.
    pub fn question_at<'q>(&self, id: NodeId, questions: &'q QuestionSet) -> Option<&'q Question> {
        self.internal(id).and_then(|node| questions.get(&node.question))
    }

    /// Check every split refers to a question in `questions`.
    pub fn validate_questions(&self, questions: &QuestionSet) -> Result<()> {
        match self
            .internal_nodes()
            .find(|node| !questions.contains(&node.question))
        {
            Some(node) => Err(HtkError::structure(format!(
                "tree {}: node {} uses unknown question {}",
                self.stream, node.index, node.question
            ))),
            None => Ok(()),
        }
    }

    /// Walk the tree for one context label and return the leaf it lands on.
    pub fn find_leaf(&self, label: &str, questions: &QuestionSet) -> Result<&LeafNode> {
        let mut id = self.root;
        loop {
            match &self.nodes[id.0] {
                TreeNode::Leaf(leaf) => return Ok(leaf),
                TreeNode::Internal(node) => {
                    let question = questions.get(&node.question).ok_or_else(|| {
                        HtkError::structure(format!(
                            "tree {}: node {} uses unknown question {}",
                            self.stream, node.index, node.question
                        ))
                    })?;
                    id = if question.matches(label) { node.yes } else { node.no };
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serialised form
// ---------------------------------------------------------------------------

/// The arena as stored by serde. Incoming arenas are rebuilt through
/// [`DecisionTree::from_records`] and must come back in the same layout.
#[derive(Serialize, Deserialize)]
struct TreeArena {
    stream: StreamSpec,
    nodes: Vec<TreeNode>,
    root: NodeId,
}

impl TryFrom<TreeArena> for DecisionTree {
    type Error = HtkError;

    fn try_from(arena: TreeArena) -> Result<Self> {
        let TreeArena {
            stream,
            nodes,
            root,
        } = arena;
        if root.0 >= nodes.len() {
            return Err(HtkError::structure(format!(
                "tree {stream}: root {} is outside the {} stored nodes",
                root.0,
                nodes.len()
            )));
        }

        let rebuilt = match &nodes[root.0] {
            TreeNode::Leaf(leaf) if nodes.len() == 1 => Self::leaf(stream.clone(), leaf.clone())?,
            TreeNode::Leaf(_) => {
                return Err(HtkError::structure(format!(
                    "tree {stream}: a leaf root must be the only node"
                )))
            }
            TreeNode::Internal(_) => {
                let mut records = Vec::new();
                for node in &nodes {
                    let TreeNode::Internal(split) = node else {
                        continue;
                    };
                    let child = |id: NodeId| -> Result<ChildRef> {
                        match nodes.get(id.0) {
                            Some(TreeNode::Internal(target)) => Ok(ChildRef::Split(target.index)),
                            Some(TreeNode::Leaf(leaf)) => Ok(ChildRef::Leaf(leaf.clone())),
                            None => Err(HtkError::structure(format!(
                                "tree {stream}: node {} refers to missing slot {}",
                                split.index, id.0
                            ))),
                        }
                    };
                    records.push(SplitRecord {
                        index: split.index,
                        question: split.question.clone(),
                        no: child(split.no)?,
                        yes: child(split.yes)?,
                        line: None,
                    });
                }
                Self::from_records(stream.clone(), records)?
            }
        };

        if rebuilt.nodes != nodes || rebuilt.root != root {
            return Err(HtkError::structure(format!(
                "tree {stream}: stored nodes are not in canonical layout"
            )));
        }
        Ok(rebuilt)
    }
}

impl From<DecisionTree> for TreeArena {
    fn from(tree: DecisionTree) -> Self {
        TreeArena {
            stream: tree.stream,
            nodes: tree.nodes,
            root: tree.root,
        }
    }
}

/// Pre-order iterator over a [`DecisionTree`].
pub struct Preorder<'a> {
    tree: &'a DecisionTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        if let TreeNode::Internal(split) = node {
            self.stack.push(split.yes);
            self.stack.push(split.no);
        }
        Some((id, node))
    }
}

// ---------------------------------------------------------------------------
// TreeFile – question header plus one tree per stream / state
// ---------------------------------------------------------------------------

/// Contents of an HTS tree file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreeFile {
    pub questions: QuestionSet,
    pub trees: Vec<DecisionTree>,
}

impl TreeFile {
    /// Check every tree only uses questions from the header.
    pub fn validate(&self) -> Result<()> {
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate_questions(&self.questions))
    }

    pub fn tree(&self, stream: &str) -> Option<&DecisionTree> {
        self.trees.iter().find(|t| t.stream.as_str() == stream)
    }
}

/// Map every leaf macro id used by `trees` to a dense index, in sorted order.
///
/// For example `mgc_s2_23` might map to `0`.
pub fn leaf_macro_index<'a>(
    trees: impl IntoIterator<Item = &'a DecisionTree>,
) -> Vec<(String, usize)> {
    let ids: BTreeSet<&str> = trees
        .into_iter()
        .flat_map(|tree| tree.leaves())
        .filter_map(|leaf| leaf.macro_id.as_deref())
        .collect();
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), i))
        .collect()
}
