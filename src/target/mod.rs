//! Target Document Assembler.
//!
//! Builds one standalone XBRL instance per render target: header comments,
//! namespace registration, schemaRef/linkbaseRef copying, pruned
//! context/unit resources, root-level facts, resolved tuple hierarchy and
//! footnote link networks.

pub mod footnote;
pub mod tuple;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::ExtractError;
use crate::index::{IxNode, SourceIndex};
use crate::names;
use crate::output::{NodeId, OutputDocument};

/// Per-target extraction counters, reported after assembly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub target: String,
    pub facts: usize,
    pub tuples: usize,
    pub contexts: usize,
    pub units: usize,
    pub footnote_links: usize,
}

/// One assembled target: the instance document plus its counters.
pub struct TargetDocument {
    pub target: String,
    pub document: OutputDocument,
    pub summary: ExtractionSummary,
}

/// Assembles every discovered render target. A contract violation aborts
/// only the target it occurred in; sibling targets still assemble.
pub fn extract_all<'a, 'input>(
    index: &SourceIndex<'a, 'input>,
) -> Vec<(String, Result<TargetDocument, ExtractError>)> {
    index
        .targets()
        .into_iter()
        .map(|target| {
            let result = TargetAssembler::assemble(index, target);
            if let Err(e) = &result {
                log::error!("target {:?} failed to assemble: {}", target, e);
            }
            (target.to_string(), result)
        })
        .collect()
}

pub struct TargetAssembler<'a, 'x, 'input> {
    pub(crate) index: &'a SourceIndex<'x, 'input>,
    pub(crate) target: &'a str,
    pub(crate) out: OutputDocument,
    pub(crate) emitted_ids: HashSet<String>,
    // context/unit ids actually written onto emitted facts
    pub(crate) used_refs: HashSet<String>,
    pub(crate) summary: ExtractionSummary,
}

impl<'a, 'x, 'input> TargetAssembler<'a, 'x, 'input> {
    /// Builds the instance document for one render target.
    pub fn assemble(
        index: &'a SourceIndex<'x, 'input>,
        target: &'a str,
    ) -> Result<TargetDocument, ExtractError> {
        let mut assembler = TargetAssembler {
            index,
            target,
            out: OutputDocument::new(),
            emitted_ids: HashSet::new(),
            used_refs: HashSet::new(),
            summary: ExtractionSummary {
                target: target.to_string(),
                ..Default::default()
            },
        };

        assembler.write_header()?;
        assembler.collect_namespaces();
        assembler.copy_references()?;

        // Facts are emitted first so resource pruning sees only the
        // references that survived dedup and the graceful drop paths; the
        // resource copies are then slotted back in front of the facts.
        let facts = assembler.target_facts();
        let root = assembler.out.root()?;
        let resource_slot = assembler.out.child_count(root);
        assembler.emit_facts(&facts)?;
        assembler.link_footnotes()?;
        let emitted = assembler.out.child_count(root);
        assembler.copy_resources()?;
        let copied = assembler.out.child_count(root) - emitted;
        assembler.out.move_tail_children(root, resource_slot, copied)?;

        log::debug!(
            "assembled target {:?}: {}",
            target,
            serde_json::to_string(&assembler.summary).unwrap_or_default()
        );
        Ok(TargetDocument {
            target: target.to_string(),
            document: assembler.out,
            summary: assembler.summary,
        })
    }

    fn write_header(&mut self) -> Result<(), ExtractError> {
        let root = self.out.add_root("xbrl", None, Some(names::NS_XBRLI));
        let location = self
            .index
            .docs()
            .first()
            .and_then(|d| d.base_uri())
            .map(|u| u.to_string())
            .unwrap_or_else(|| "in-memory document set".to_string());
        self.out
            .add_comment(&format!(" Location: {} ", location), Some(root))?;
        let label = if self.target.is_empty() {
            "(default)".to_string()
        } else {
            format!("\"{}\"", self.target)
        };
        self.out.add_comment(
            &format!(
                " Description: instance extracted from inline XBRL, target {} ",
                label
            ),
            Some(root),
        )?;
        self.out.add_comment(
            &format!(" Generated on {} ", Utc::now().format("%Y-%m-%dT%H:%M:%SZ")),
            Some(root),
        )?;
        Ok(())
    }

    /// Registers every namespace declared on the source roots except the
    /// inline-markup and transformation-registry ones, then guarantees a
    /// prefix for the instance namespace itself.
    fn collect_namespaces(&mut self) {
        for source in self.index.docs() {
            for ns in source_root_namespaces(source) {
                let (prefix, uri) = ns;
                if names::is_excluded_ns(uri) || prefix == "xml" {
                    continue;
                }
                self.out.add_prefix(prefix, uri);
            }
        }
        self.out.add_prefix("xbrli", names::NS_XBRLI);
    }

    /// Copies this target's `ix:references` content: the references
    /// element's own attributes land on the root, each child becomes a
    /// schemaRef/linkbaseRef with its href resolved against the owning
    /// document's base URI.
    fn copy_references(&mut self) -> Result<(), ExtractError> {
        let refs: Vec<IxNode> = self
            .index
            .nodes_for_target(self.target, names::TAG_REFERENCES)
            .to_vec();
        for references in refs {
            for attr in references.node.attributes() {
                if attr.namespace().map(names::is_ix_ns).unwrap_or(false) {
                    continue;
                }
                if attr.namespace().is_none() && names::is_control_attr(attr.name()) {
                    continue;
                }
                if attr.namespace() == Some(names::NS_XML) && attr.name() == "base" {
                    continue;
                }
                if attr.namespace().is_none() && attr.name() == "id" {
                    continue;
                }
                let prefix = attr
                    .namespace()
                    .map(|ans| {
                        let p = references.node.lookup_prefix(ans).unwrap_or("");
                        self.out.add_prefix(p, ans)
                    });
                self.out.add_attr(
                    attr.name(),
                    attr.value(),
                    None,
                    prefix.as_deref(),
                    attr.namespace(),
                )?;
            }
            let children: Vec<_> = references
                .node
                .children()
                .filter(|c| c.is_element())
                .collect();
            for child in children {
                let id = self.copy_element(child, None)?;
                self.resolve_href(references, id)?;
            }
        }
        Ok(())
    }

    fn resolve_href(&mut self, references: IxNode, element: NodeId) -> Result<(), ExtractError> {
        let base = match self.index.docs().get(references.doc).and_then(|d| d.base_uri()) {
            Some(base) => base.clone(),
            None => return Ok(()),
        };
        let href = match self.attr_value(element, "href") {
            Some(h) => h,
            None => return Ok(()),
        };
        // Absolute hrefs survive join unchanged; only relative ones move.
        if let Ok(resolved) = base.join(&href) {
            self.out.set_attr_value(element, "href", resolved.as_str());
        }
        Ok(())
    }

    fn attr_value(&self, element: NodeId, name: &str) -> Option<String> {
        match self.out.node(element) {
            crate::output::OutNode::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.clone()),
            _ => None,
        }
    }

    /// This target's facts and tuples in document order, with everything
    /// inside an `ix:exclude` subtree dropped outright. Orphaned
    /// descendants of an excluded tuple fall with it.
    fn target_facts(&self) -> Vec<IxNode<'x, 'input>> {
        let mut excluded: HashSet<(usize, usize)> = HashSet::new();
        for exclude in self.index.nodes_for_target(self.target, names::TAG_EXCLUDE) {
            for node in exclude.node.descendants() {
                excluded.insert((exclude.doc, node.id().get() as usize));
            }
        }

        let mut facts: Vec<IxNode> = Vec::new();
        for tag in names::FACT_TAGS.iter().chain([&names::TAG_TUPLE]) {
            for fact in self.index.nodes_for_target(self.target, tag) {
                if excluded.contains(&fact.key()) {
                    log::debug!(
                        "dropping excluded {} {:?} from target {:?}",
                        fact.local_name(),
                        fact.name(),
                        self.target
                    );
                    continue;
                }
                facts.push(*fact);
            }
        }
        facts.sort_by_key(|f| f.seq);
        facts
    }

    /// Copies the context and unit resources the emitted facts actually
    /// reference, plus every roleRef/arcroleRef from the shared pool. Runs
    /// after fact emission, so a reference held only by a dropped fact
    /// keeps nothing alive.
    fn copy_resources(&mut self) -> Result<(), ExtractError> {
        let used = self.used_refs.clone();
        let contexts: Vec<IxNode> = self.index.nodes(names::TAG_CONTEXT).to_vec();
        for context in contexts {
            if context.id().map(|id| used.contains(id)).unwrap_or(false) {
                self.copy_element(context.node, None)?;
                self.summary.contexts += 1;
            }
        }
        let units: Vec<IxNode> = self.index.nodes(names::TAG_UNIT).to_vec();
        for unit in units {
            if unit.id().map(|id| used.contains(id)).unwrap_or(false) {
                self.copy_element(unit.node, None)?;
                self.summary.units += 1;
            }
        }
        // roleRef/arcroleRef resources are kept unconditionally.
        for tag in [names::TAG_ROLE_REF, names::TAG_ARCROLE_REF] {
            let refs: Vec<IxNode> = self.index.nodes(tag).to_vec();
            for reference in refs {
                self.copy_element(reference.node, None)?;
            }
        }
        Ok(())
    }

    /// Classifies this target's facts and emits them: directly addressed
    /// facts at the root in document order, everything else through the
    /// tuple hierarchy resolver.
    fn emit_facts(&mut self, facts: &[IxNode<'x, 'input>]) -> Result<(), ExtractError> {
        let member_keys: HashSet<(usize, usize)> = facts.iter().map(|f| f.key()).collect();
        let by_tuple_id: HashMap<&str, IxNode> = facts
            .iter()
            .filter(|f| f.is_tuple())
            .filter_map(|f| f.tuple_id().map(|id| (id, *f)))
            .collect();

        let mut queues: HashMap<(usize, usize), Vec<IxNode<'x, 'input>>> = HashMap::new();
        let mut direct: Vec<IxNode> = Vec::new();
        let mut root_tuples: Vec<IxNode> = Vec::new();

        for fact in facts {
            let parent_key = if let Some(tuple_ref) = fact.tuple_ref() {
                match by_tuple_id.get(tuple_ref) {
                    Some(tuple) => Some(tuple.key()),
                    None => {
                        log::warn!(
                            "fact {:?} references unknown tuple {:?}; dropped",
                            fact.name(),
                            tuple_ref
                        );
                        continue;
                    }
                }
            } else {
                fact.enclosing_tuple()
                    .map(|t| (fact.doc, t.id().get() as usize))
                    .filter(|key| member_keys.contains(key))
            };

            match parent_key {
                Some(key) => queues.entry(key).or_default().push(*fact),
                None if fact.is_tuple() => root_tuples.push(*fact),
                None => direct.push(*fact),
            }
        }

        let root = self.out.root()?;
        for fact in direct {
            self.emit_fact(fact, root)?;
        }
        self.resolve_level(root_tuples, root, &queues)
    }

    /// Deep-copies a source element (context, unit, roleRef, schemaRef...)
    /// into the output, registering every namespace it touches.
    pub(crate) fn copy_element(
        &mut self,
        node: roxmltree::Node,
        parent: Option<NodeId>,
    ) -> Result<NodeId, ExtractError> {
        let ns = node.tag_name().namespace();
        let prefix = ns.map(|uri| {
            let p = node.lookup_prefix(uri).unwrap_or("");
            self.out.add_prefix(p, uri)
        });
        let element = self.out.add_element(
            node.tag_name().name(),
            parent,
            prefix.as_deref(),
            ns,
        )?;
        for attr in node.attributes() {
            if attr.namespace().map(names::is_ix_ns).unwrap_or(false) {
                continue;
            }
            let aprefix = attr.namespace().map(|ans| {
                if ans == names::NS_XML {
                    "xml".to_string()
                } else {
                    let p = node.lookup_prefix(ans).unwrap_or("");
                    self.out.add_prefix(p, ans)
                }
            });
            self.out.add_attr(
                attr.name(),
                attr.value(),
                Some(element),
                aprefix.as_deref(),
                attr.namespace(),
            )?;
        }
        for child in node.children() {
            if child.is_text() {
                let text = child.text().unwrap_or("");
                if !text.trim().is_empty() {
                    self.out.add_content(text.trim(), element)?;
                }
            } else if child.is_element() {
                self.copy_element(child, Some(element))?;
            }
        }
        Ok(element)
    }
}

fn source_root_namespaces<'a, 'input>(
    source: &'a crate::index::SourceDoc<'input>,
) -> Vec<(&'a str, &'a str)> {
    source
        .root_namespaces()
        .into_iter()
        .filter(|(p, _)| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SourceDoc;

    const SOURCE: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"
        xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
        xmlns:ixt="http://www.xbrl.org/inlineXBRL/transformation/2015-02-26"
        xmlns:xbrli="http://www.xbrl.org/2003/instance"
        xmlns:link="http://www.xbrl.org/2003/linkbase"
        xmlns:xlink="http://www.w3.org/1999/xlink"
        xmlns:dei="http://xbrl.sec.gov/dei/2023">
      <body>
        <ix:header>
          <ix:references>
            <link:schemaRef xlink:type="simple" xlink:href="acme-2023.xsd"/>
          </ix:references>
          <ix:resources>
            <xbrli:context id="c1">
              <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000123</xbrli:identifier></xbrli:entity>
            </xbrli:context>
            <xbrli:context id="c2">
              <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000123</xbrli:identifier></xbrli:entity>
            </xbrli:context>
            <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
            <xbrli:unit id="shares"><xbrli:measure>xbrli:shares</xbrli:measure></xbrli:unit>
          </ix:resources>
        </ix:header>
        <div>
          <ix:nonNumeric name="dei:DocumentType" contextRef="c1" id="doctype">10-K</ix:nonNumeric>
          <ix:nonFraction name="dei:EntityCommonStockSharesOutstanding" contextRef="c1" unitRef="shares" scale="3">3,100</ix:nonFraction>
        </div>
      </body>
    </html>"#;

    fn assemble_default(source: &str) -> TargetDocument {
        let docs = vec![SourceDoc::parse(source, None).unwrap()];
        let index = crate::index::SourceIndex::build(&docs);
        TargetAssembler::assemble(&index, "").unwrap()
    }

    #[test]
    fn test_assembles_default_target() {
        let assembled = assemble_default(SOURCE);
        let xml = assembled.document.to_xml().unwrap();

        assert!(xml.contains("<xbrli:xbrl"));
        assert!(xml.contains("xmlns:dei="));
        // Inline and transformation namespaces never leak.
        assert!(!xml.contains("inlineXBRL"));
        assert!(xml.contains("<link:schemaRef"));
        assert!(xml.contains("<dei:DocumentType contextRef=\"c1\" id=\"doctype\">10-K</dei:DocumentType>"));
        // Scale applied on the digit string.
        assert!(xml.contains(">3100000<"));
        assert_eq!(assembled.summary.facts, 2);
    }

    #[test]
    fn test_unused_resources_pruned() {
        let assembled = assemble_default(SOURCE);
        let xml = assembled.document.to_xml().unwrap();
        assert!(xml.contains("id=\"c1\""));
        assert!(!xml.contains("id=\"c2\""));
        assert!(xml.contains("id=\"shares\""));
        assert!(!xml.contains("id=\"usd\""));
        assert_eq!(assembled.summary.contexts, 1);
        assert_eq!(assembled.summary.units, 1);
    }

    #[test]
    fn test_pruning_ignores_references_of_dropped_facts() {
        // c2 is referenced only by a dedup-collapsed sibling, c3/u1 only by
        // a fraction skipped for its missing denominator. None may survive.
        let source = r#"<html xmlns="http://www.w3.org/1999/xhtml"
            xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
            xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:acme="http://acme.example.com/2023">
          <body>
            <ix:resources>
              <xbrli:context id="c1"><xbrli:entity/></xbrli:context>
              <xbrli:context id="c2"><xbrli:entity/></xbrli:context>
              <xbrli:context id="c3"><xbrli:entity/></xbrli:context>
              <xbrli:unit id="u1"><xbrli:measure>xbrli:pure</xbrli:measure></xbrli:unit>
            </ix:resources>
            <ix:tuple name="acme:Holding">
              <ix:nonNumeric name="acme:Amount" contextRef="c1" order="1">100</ix:nonNumeric>
              <ix:nonNumeric name="acme:Amount" contextRef="c2" order="1">100</ix:nonNumeric>
            </ix:tuple>
            <ix:fraction name="acme:Ratio" contextRef="c3" unitRef="u1">
              <ix:numerator>3</ix:numerator>
            </ix:fraction>
          </body>
        </html>"#;
        let assembled = assemble_default(source);
        let xml = assembled.document.to_xml().unwrap();
        assert!(xml.contains("id=\"c1\""));
        assert!(!xml.contains("id=\"c2\""));
        assert!(!xml.contains("id=\"c3\""));
        assert!(!xml.contains("id=\"u1\""));
        assert_eq!(assembled.summary.contexts, 1);
        assert_eq!(assembled.summary.units, 0);
        // Resource copies still precede the facts in the document.
        assert!(xml.find("id=\"c1\"").unwrap() < xml.find("<acme:Holding").unwrap());
    }

    #[test]
    fn test_excluded_fact_dropped() {
        let source = SOURCE.replace(
            "<ix:nonNumeric name=\"dei:DocumentType\"",
            "<ix:exclude><ix:nonNumeric name=\"dei:DocumentType\"",
        );
        let source = source.replace("</ix:nonNumeric>", "</ix:nonNumeric></ix:exclude>");
        let assembled = assemble_default(&source);
        let xml = assembled.document.to_xml().unwrap();
        assert!(!xml.contains("DocumentType"));
        // c1 is still referenced by the shares fact, so it stays.
        assert!(xml.contains("id=\"c1\""));
        assert_eq!(assembled.summary.facts, 1);
    }
}
