// Owned, mutable XML tree for a single SVG fragment.
//
// roxmltree gives us a validating, read-only parse; the multiline rewrite needs to splice
// nodes, so the parse is copied into an arena and serialized back out. Nodes are never
// freed while the tree lives: detaching a node only unlinks it from its parent.

use std::fmt;

const XML_PREFIX: &str = "xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Qualified name as written, e.g. `x` or `xlink:href`.
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    /// `None` for the default namespace.
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub name: String,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Overwrites in place, or appends so existing attribute order is kept.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(attr) = self.attributes.iter_mut().find(|attr| attr.name == name) {
            attr.value = value;
            return;
        }
        self.attributes.push(Attribute {
            name: name.to_string(),
            value,
        });
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|attr| attr.name == name)?;
        Some(self.attributes.remove(idx).value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, value: Option<String> },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SvgTree {
    nodes: Vec<Node>,
    root: NodeId,
}

#[derive(Debug)]
pub struct ParseError(roxmltree::Error);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "svg fragment is not well-formed xml: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

impl SvgTree {
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        let doc = roxmltree::Document::parse(xml).map_err(ParseError)?;
        let root_node = doc.root_element();
        let mut tree = SvgTree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.import_element(root_node, None);
        Ok(tree)
    }

    fn import_element(&mut self, node: roxmltree::Node<'_, '_>, parent: Option<NodeId>) -> NodeId {
        let parent_scope: Vec<(Option<&str>, &str)> = node
            .parent_element()
            .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
            .unwrap_or_default();
        let namespaces = node
            .namespaces()
            .filter(|ns| ns.name() != Some(XML_PREFIX))
            .filter(|ns| !parent_scope.contains(&(ns.name(), ns.uri())))
            .map(|ns| NamespaceDecl {
                prefix: ns.name().map(str::to_string),
                uri: ns.uri().to_string(),
            })
            .collect();

        let attributes = node
            .attributes()
            .map(|attr| Attribute {
                name: qualify(node, attr.namespace(), attr.name(), false),
                value: attr.value().to_string(),
            })
            .collect();

        let tag = node.tag_name();
        let data = ElementData {
            name: qualify(node, tag.namespace(), tag.name(), true),
            namespaces,
            attributes,
        };
        let id = self.push(NodeKind::Element(data), parent);

        for child in node.children() {
            if child.is_element() {
                let child_id = self.import_element(child, Some(id));
                self.nodes[id.0].children.push(child_id);
                continue;
            }
            let kind = if child.is_text() {
                NodeKind::Text(child.text().unwrap_or_default().to_string())
            } else if child.is_comment() {
                NodeKind::Comment(child.text().unwrap_or_default().to_string())
            } else if let Some(pi) = child.pi() {
                NodeKind::ProcessingInstruction {
                    target: pi.target.to_string(),
                    value: pi.value.map(str::to_string),
                }
            } else {
                continue;
            };
            let child_id = self.push(kind, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::local_name)
    }

    pub fn is_element_named(&self, id: NodeId, local: &str) -> bool {
        self.local_name(id) == Some(local)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attribute(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
    }

    /// Nearest-first chain of parents, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |current| self.parent(*current))
    }

    /// Attached nodes below `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(text) = self.kind(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn create_element(&mut self, data: ElementData) -> NodeId {
        self.push(NodeKind::Element(data), None)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()), None)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != id);
    }

    /// Splices `replacements` into the parent's child list where `target` stood and
    /// detaches `target`. Returns false when `target` has no parent (the root).
    pub fn replace_with(&mut self, target: NodeId, replacements: &[NodeId]) -> bool {
        let Some(parent) = self.nodes[target.0].parent else {
            return false;
        };
        for node in replacements {
            self.detach(*node);
        }
        let Some(pos) = self.nodes[parent.0]
            .children
            .iter()
            .position(|child| *child == target)
        else {
            return false;
        };
        for node in replacements {
            self.nodes[node.0].parent = Some(parent);
        }
        self.nodes[parent.0]
            .children
            .splice(pos..=pos, replacements.iter().copied());
        self.nodes[target.0].parent = None;
        true
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for ns in &el.namespaces {
                    match &ns.prefix {
                        Some(prefix) => {
                            out.push_str(" xmlns:");
                            out.push_str(prefix);
                        }
                        None => out.push_str(" xmlns"),
                    }
                    out.push_str("=\"");
                    escape_xml_attr(&ns.uri, out);
                    out.push('"');
                }
                for attr in &el.attributes {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_xml_attr(&attr.value, out);
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
            NodeKind::Text(text) => escape_xml_text(text, out),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, value } => {
                out.push_str("<?");
                out.push_str(target);
                if let Some(value) = value {
                    out.push(' ');
                    out.push_str(value);
                }
                out.push_str("?>");
            }
        }
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn qualify(
    node: roxmltree::Node<'_, '_>,
    namespace: Option<&str>,
    local: &str,
    is_element: bool,
) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    // Unprefixed attributes never carry a namespace, so the default namespace only
    // applies to element names.
    if is_element && node.default_namespace() == Some(uri) {
        return local.to_string();
    }
    match node.lookup_prefix(uri) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

// Whitespace characters are written as references so attribute-value normalization on
// re-parse gives back the same value.
fn escape_xml_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

fn escape_xml_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}
