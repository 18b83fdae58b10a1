//! Source Index Builder.
//!
//! Parses the inline source documents once and builds the four lookups the
//! assembler works from: by tag name, by element id, by render target, and
//! per-target grouped by tag name. Nodes keep a global document-order
//! sequence number; it is the tie-break key everywhere encounter order
//! matters.

use anyhow::{anyhow, Result};
use roxmltree::{Document, Node};
use std::collections::{BTreeSet, HashMap};
use url::Url;

use crate::names;

/// One parsed inline document plus the base URI relative hrefs resolve
/// against.
pub struct SourceDoc<'input> {
    doc: Document<'input>,
    base_uri: Option<Url>,
}

impl<'input> SourceDoc<'input> {
    pub fn parse(text: &'input str, base_uri: Option<Url>) -> Result<Self> {
        let doc = Document::parse(text)
            .map_err(|e| anyhow!("error parsing inline source document: {}", e))?;
        Ok(Self { doc, base_uri })
    }

    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    /// Namespace declarations in scope on the document root.
    pub fn root_namespaces(&self) -> Vec<(&str, &str)> {
        self.doc
            .root_element()
            .namespaces()
            .map(|ns| (ns.name().unwrap_or(""), ns.uri()))
            .collect()
    }
}

/// A handle on one inline-markup node: the node itself, the index of its
/// owning document and its global document-order sequence number.
#[derive(Clone, Copy)]
pub struct IxNode<'a, 'input> {
    pub node: Node<'a, 'input>,
    pub doc: usize,
    pub seq: usize,
}

impl<'a, 'input> IxNode<'a, 'input> {
    /// Stable identity of the underlying source node.
    pub fn key(&self) -> (usize, usize) {
        (self.doc, self.node.id().get() as usize)
    }

    pub fn local_name(&self) -> &'a str {
        self.node.tag_name().name()
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node.attribute(name)
    }

    pub fn id(&self) -> Option<&'a str> {
        self.attr("id")
    }

    pub fn name(&self) -> Option<&'a str> {
        self.attr("name")
    }

    /// Render target label; the default target is the empty string.
    pub fn target(&self) -> &'a str {
        self.attr("target").unwrap_or("")
    }

    /// Sibling ordering key; missing or unparseable orders sort as 0.
    pub fn order(&self) -> f64 {
        self.attr("order")
            .and_then(|o| o.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    pub fn tuple_id(&self) -> Option<&'a str> {
        // Inline XBRL 1.1 spells it tupleID; accept the 1.0 casing too.
        self.attr("tupleID").or_else(|| self.attr("tupleId"))
    }

    pub fn tuple_ref(&self) -> Option<&'a str> {
        self.attr("tupleRef")
    }

    pub fn context_ref(&self) -> Option<&'a str> {
        self.attr("contextRef")
    }

    pub fn unit_ref(&self) -> Option<&'a str> {
        self.attr("unitRef")
    }

    pub fn is_nil(&self) -> bool {
        self.node
            .attribute((names::NS_XSI, "nil"))
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    pub fn is_fact(&self) -> bool {
        names::FACT_TAGS.contains(&self.local_name())
    }

    pub fn is_tuple(&self) -> bool {
        self.local_name() == names::TAG_TUPLE
    }

    pub fn is_footnote(&self) -> bool {
        self.local_name() == names::TAG_FOOTNOTE
    }

    /// Nearest enclosing `ix:tuple` by original nesting, if any.
    pub fn enclosing_tuple(&self) -> Option<Node<'a, 'input>> {
        self.node.ancestors().skip(1).find(|a| {
            a.is_element()
                && a.tag_name().name() == names::TAG_TUPLE
                && a.tag_name().namespace().map(names::is_ix_ns).unwrap_or(false)
        })
    }

    /// Whether `other` sits inside this node's subtree.
    pub fn is_ancestor_of(&self, other: Node) -> bool {
        other
            .ancestors()
            .skip(1)
            .any(|a| a.id() == self.node.id())
            && self.doc_ptr_eq(other)
    }

    fn doc_ptr_eq(&self, other: Node) -> bool {
        let a = self.node.document() as *const _ as *const u8;
        let b = other.document() as *const _ as *const u8;
        a == b
    }
}

/// The four indices of the engine's input contract.
pub struct SourceIndex<'a, 'input> {
    pub by_tag: HashMap<&'a str, Vec<IxNode<'a, 'input>>>,
    pub by_id: HashMap<&'a str, IxNode<'a, 'input>>,
    pub by_target: HashMap<&'a str, HashMap<&'a str, Vec<IxNode<'a, 'input>>>>,
    docs: &'a [SourceDoc<'input>],
    targets: BTreeSet<&'a str>,
}

/// Local names the index is built over. Context/unit/roleRef/arcroleRef are
/// not inline elements but live under `ix:resources` and are indexed by the
/// same mechanism.
const INDEXED_TAGS: &[&str] = &[
    names::TAG_REFERENCES,
    names::TAG_RESOURCES,
    names::TAG_EXCLUDE,
    names::TAG_FRACTION,
    names::TAG_NON_FRACTION,
    names::TAG_NON_NUMERIC,
    names::TAG_NUMERATOR,
    names::TAG_DENOMINATOR,
    names::TAG_TUPLE,
    names::TAG_FOOTNOTE,
    names::TAG_RELATIONSHIP,
];

const RESOURCE_TAGS: &[&str] = &[
    names::TAG_CONTEXT,
    names::TAG_UNIT,
    names::TAG_ROLE_REF,
    names::TAG_ARCROLE_REF,
];

impl<'a, 'input> SourceIndex<'a, 'input> {
    pub fn build(docs: &'a [SourceDoc<'input>]) -> Self {
        let mut index = SourceIndex {
            by_tag: HashMap::new(),
            by_id: HashMap::new(),
            by_target: HashMap::new(),
            docs,
            targets: BTreeSet::new(),
        };
        // The default target always exists, even for a source whose every
        // fact is targeted elsewhere.
        index.targets.insert("");

        let mut seq = 0usize;
        for (doc_idx, source) in docs.iter().enumerate() {
            for node in source.doc.root_element().descendants().filter(|n| n.is_element()) {
                let ns = node.tag_name().namespace().unwrap_or("");
                let local = node.tag_name().name();
                let inline = names::is_ix_ns(ns) && INDEXED_TAGS.contains(&local);
                let resource = RESOURCE_TAGS.contains(&local)
                    && (ns == names::NS_XBRLI || ns == names::NS_LINK);
                if !inline && !resource {
                    continue;
                }
                let handle = IxNode { node, doc: doc_idx, seq };
                seq += 1;

                index.by_tag.entry(local).or_default().push(handle);
                if let Some(id) = handle.id() {
                    index.by_id.insert(id, handle);
                }
                if inline {
                    let target = handle.target();
                    index
                        .by_target
                        .entry(target)
                        .or_default()
                        .entry(local)
                        .or_default()
                        .push(handle);
                    if handle.is_fact() || handle.is_tuple() || local == names::TAG_REFERENCES {
                        index.targets.insert(target);
                    }
                }
            }
        }
        log::debug!(
            "indexed {} inline nodes across {} documents, {} targets",
            seq,
            docs.len(),
            index.targets.len()
        );
        index
    }

    pub fn docs(&self) -> &'a [SourceDoc<'input>] {
        self.docs
    }

    /// Discovered render targets, default target first.
    pub fn targets(&self) -> Vec<&'a str> {
        self.targets.iter().copied().collect()
    }

    pub fn nodes(&self, tag: &str) -> &[IxNode<'a, 'input>] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nodes_for_target(&self, target: &str, tag: &str) -> &[IxNode<'a, 'input>] {
        self.by_target
            .get(target)
            .and_then(|tags| tags.get(tag))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
