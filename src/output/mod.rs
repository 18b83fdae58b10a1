//! Arena-backed output document.
//!
//! All output nodes live in one `Vec`; parents and children refer to each
//! other by index. Namespace declarations are only ever written on the root
//! element, so prefix registration is a document-level map.

pub mod serialize;

use crate::error::ExtractError;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct OutAttr {
    pub prefix: Option<String>,
    pub ns: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum OutNode {
    Element {
        prefix: Option<String>,
        ns: Option<String>,
        name: String,
        attrs: Vec<OutAttr>,
        children: Vec<NodeId>,
        parent: Option<NodeId>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Default)]
pub struct OutputDocument {
    nodes: Vec<OutNode>,
    root: Option<NodeId>,
    // (prefix, uri) in registration order; first prefix bound to a uri wins
    // reverse lookups.
    prefixes: Vec<(String, String)>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Result<NodeId, ExtractError> {
        self.root.ok_or(ExtractError::NoRootDefined)
    }

    pub fn node(&self, id: NodeId) -> &OutNode {
        &self.nodes[id]
    }

    /// Creates the document root. Any previously set root is replaced.
    pub fn add_root(&mut self, name: &str, prefix: Option<&str>, ns: Option<&str>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(OutNode::Element {
            prefix: prefix.map(str::to_string),
            ns: ns.map(str::to_string),
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
            parent: None,
        });
        self.root = Some(id);
        id
    }

    /// Adds an element under `parent` (the root when `None`).
    ///
    /// A missing namespace is resolved from the given prefix's in-scope
    /// binding and vice versa; when neither resolves the element is built
    /// unprefixed.
    pub fn add_element(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        prefix: Option<&str>,
        ns: Option<&str>,
    ) -> Result<NodeId, ExtractError> {
        let parent = match parent {
            Some(p) => p,
            None => self.root()?,
        };
        let (prefix, ns) = self.resolve_binding(prefix, ns);
        let id = self.nodes.len();
        self.nodes.push(OutNode::Element {
            prefix,
            ns,
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
            parent: Some(parent),
        });
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Sets an attribute on `parent` (the root when `None`). An existing
    /// attribute with the same expanded name is overwritten.
    pub fn add_attr(
        &mut self,
        name: &str,
        value: &str,
        parent: Option<NodeId>,
        prefix: Option<&str>,
        ns: Option<&str>,
    ) -> Result<(), ExtractError> {
        let parent = match parent {
            Some(p) => p,
            None => self.root()?,
        };
        let (prefix, ns) = self.resolve_binding(prefix, ns);
        match &mut self.nodes[parent] {
            OutNode::Element { attrs, .. } => {
                if let Some(existing) = attrs.iter_mut().find(|a| a.name == name && a.ns == ns) {
                    existing.value = value.to_string();
                } else {
                    attrs.push(OutAttr {
                        prefix,
                        ns,
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
                Ok(())
            }
            _ => Err(ExtractError::InvalidParentNode(parent)),
        }
    }

    /// Rewrites the first attribute with the given local name on `element`.
    /// Returns whether anything matched.
    pub fn set_attr_value(&mut self, element: NodeId, name: &str, value: &str) -> bool {
        match &mut self.nodes[element] {
            OutNode::Element { attrs, .. } => {
                if let Some(attr) = attrs.iter_mut().find(|a| a.name == name) {
                    attr.value = value.to_string();
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    pub fn add_content(&mut self, text: &str, parent: NodeId) -> Result<(), ExtractError> {
        let id = self.nodes.len();
        self.nodes.push(OutNode::Text(text.to_string()));
        self.attach(parent, id)
    }

    pub fn add_comment(&mut self, text: &str, parent: Option<NodeId>) -> Result<(), ExtractError> {
        let parent = match parent {
            Some(p) => p,
            None => self.root()?,
        };
        let id = self.nodes.len();
        self.nodes.push(OutNode::Comment(text.to_string()));
        self.attach(parent, id)
    }

    /// Registers a namespace prefix for declaration on the root. Idempotent
    /// per `(prefix, uri)`; a prefix already bound to a different uri gets a
    /// numbered replacement. Returns the prefix actually registered.
    pub fn add_prefix(&mut self, prefix: &str, ns: &str) -> String {
        if let Some((p, _)) = self
            .prefixes
            .iter()
            .find(|(p, u)| u.as_str() == ns && (p.as_str() == prefix || prefix.is_empty()))
        {
            return p.clone();
        }
        let mut chosen = prefix.to_string();
        if chosen.is_empty() || self.prefixes.iter().any(|(p, _)| *p == chosen) {
            // Prefix taken by another uri (or absent in the source); pick the
            // first free numbered one.
            if let Some((p, _)) = self.prefixes.iter().find(|(_, u)| u.as_str() == ns) {
                return p.clone();
            }
            let mut n = 0;
            loop {
                chosen = format!("ns{}", n);
                if !self.prefixes.iter().any(|(p, _)| *p == chosen) {
                    break;
                }
                n += 1;
            }
        } else if let Some((p, _)) = self.prefixes.iter().find(|(_, u)| u.as_str() == ns) {
            // Same uri already reachable under another prefix; reuse it
            // rather than declaring twice.
            return p.clone();
        }
        self.prefixes.push((chosen.clone(), ns.to_string()));
        chosen
    }

    pub fn prefix_for(&self, ns: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, u)| u.as_str() == ns)
            .map(|(p, _)| p.as_str())
    }

    pub fn ns_for(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(p, _)| p.as_str() == prefix)
            .map(|(_, u)| u.as_str())
    }

    pub fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        match &self.nodes[id] {
            OutNode::Element { children, .. } => children.len(),
            _ => 0,
        }
    }

    /// Moves the last `count` children of `parent` in front of position
    /// `at`, keeping both groups in their relative order.
    pub fn move_tail_children(
        &mut self,
        parent: NodeId,
        at: usize,
        count: usize,
    ) -> Result<(), ExtractError> {
        match &mut self.nodes[parent] {
            OutNode::Element { children, .. } => {
                if count > 0 && at + count <= children.len() {
                    children[at..].rotate_right(count);
                }
                Ok(())
            }
            _ => Err(ExtractError::InvalidParentNode(parent)),
        }
    }

    /// Whether `id` has any element children.
    pub fn has_element_children(&self, id: NodeId) -> bool {
        match &self.nodes[id] {
            OutNode::Element { children, .. } => children
                .iter()
                .any(|c| matches!(self.nodes[*c], OutNode::Element { .. })),
            _ => false,
        }
    }

    /// Whether an element with attribute `name`=`value` exists anywhere.
    pub fn has_element_with_attr(&self, name: &str, value: &str) -> bool {
        self.nodes.iter().any(|n| match n {
            OutNode::Element { attrs, .. } => {
                attrs.iter().any(|a| a.name == name && a.value == value)
            }
            _ => false,
        })
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), ExtractError> {
        match &mut self.nodes[parent] {
            OutNode::Element { children, .. } => {
                children.push(child);
                Ok(())
            }
            _ => Err(ExtractError::InvalidParentNode(parent)),
        }
    }

    fn resolve_binding(
        &self,
        prefix: Option<&str>,
        ns: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        match (prefix, ns) {
            (Some(p), Some(n)) => (Some(p.to_string()), Some(n.to_string())),
            (Some(p), None) => (Some(p.to_string()), self.ns_for(p).map(str::to_string)),
            (None, Some(n)) => (self.prefix_for(n).map(str::to_string), Some(n.to_string())),
            (None, None) => (None, None),
        }
    }
}
