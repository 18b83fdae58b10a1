//! Footnote/Relationship Linker.
//!
//! Converts `ix:relationship` annotations into extended-link sections: one
//! `link:footnoteLink` per surviving toRef, holding locator/arc/footnote
//! triples. A fromRef only counts for a target when the element it
//! references belongs to that target.

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::format;
use crate::index::IxNode;
use crate::names;
use crate::output::NodeId;

use super::TargetAssembler;

/// One parsed `ix:relationship` annotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relationship {
    pub link_role: String,
    pub arc_role: String,
    pub from_refs: Vec<String>,
    pub to_refs: Vec<String>,
    pub order: Option<String>,
}

impl Relationship {
    pub fn from_node(node: &IxNode) -> Self {
        let link_role = node
            .attr("linkRole")
            .or_else(|| node.attr("linkrole"))
            .unwrap_or(names::ROLE_LINK)
            .to_string();
        let arc_role = node
            .attr("arcrole")
            .or_else(|| node.attr("arcRole"))
            .unwrap_or(names::ARCROLE_FACT_FOOTNOTE)
            .to_string();
        Relationship {
            link_role,
            arc_role,
            from_refs: id_list(node.attr("fromRefs")),
            to_refs: id_list(node.attr("toRefs")),
            order: node.attr("order").map(str::to_string),
        }
    }
}

fn id_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// toRef inversion bucket: one arcRole's order and surviving fromRefs.
struct ArcGroup {
    arc_role: String,
    order: Option<String>,
    from_refs: Vec<String>,
}

impl<'a, 'x, 'input> TargetAssembler<'a, 'x, 'input> {
    /// Builds the footnote link sections for this target, one pass per
    /// distinct link role in encounter order.
    pub(crate) fn link_footnotes(&mut self) -> Result<(), ExtractError> {
        let relationships: Vec<Relationship> = self
            .index
            .nodes(names::TAG_RELATIONSHIP)
            .iter()
            .map(Relationship::from_node)
            .collect();
        if relationships.is_empty() {
            return Ok(());
        }

        let mut link_roles: Vec<&str> = Vec::new();
        for relationship in &relationships {
            if !link_roles.contains(&relationship.link_role.as_str()) {
                link_roles.push(&relationship.link_role);
            }
        }
        for link_role in link_roles {
            let for_role: Vec<&Relationship> = relationships
                .iter()
                .filter(|r| r.link_role == link_role)
                .collect();
            self.link_role_section(link_role, &for_role)?;
        }
        Ok(())
    }

    fn link_role_section(
        &mut self,
        link_role: &str,
        relationships: &[&Relationship],
    ) -> Result<(), ExtractError> {
        // Invert toRefs: per toRef, arcRole groups in encounter order with
        // only the fromRefs whose element belongs to this target.
        let mut entries: Vec<(String, Vec<ArcGroup>)> = Vec::new();
        for relationship in relationships {
            let surviving: Vec<String> = relationship
                .from_refs
                .iter()
                .filter(|id| {
                    self.index
                        .by_id
                        .get(id.as_str())
                        .map(|n| n.target() == self.target)
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            for to_ref in &relationship.to_refs {
                let entry = match entries.iter_mut().find(|(t, _)| t == to_ref) {
                    Some(entry) => entry,
                    None => {
                        entries.push((to_ref.clone(), Vec::new()));
                        entries.last_mut().unwrap()
                    }
                };
                match entry
                    .1
                    .iter_mut()
                    .find(|g| g.arc_role == relationship.arc_role)
                {
                    Some(group) => group.from_refs.extend(surviving.iter().cloned()),
                    None => entry.1.push(ArcGroup {
                        arc_role: relationship.arc_role.clone(),
                        order: relationship.order.clone(),
                        from_refs: surviving.clone(),
                    }),
                }
            }
        }

        for (to_ref, groups) in entries {
            if groups.iter().all(|g| g.from_refs.is_empty()) {
                continue;
            }
            let to_node = match self.index.by_id.get(to_ref.as_str()) {
                Some(node) => *node,
                None => {
                    log::warn!("{}", ExtractError::DanglingFootnoteReference(to_ref));
                    continue;
                }
            };
            self.emit_footnote_link(link_role, &to_ref, to_node, &groups)?;
        }
        Ok(())
    }

    fn emit_footnote_link(
        &mut self,
        link_role: &str,
        to_ref: &str,
        to_node: IxNode<'x, 'input>,
        groups: &[ArcGroup],
    ) -> Result<(), ExtractError> {
        let link = self.out.add_prefix("link", names::NS_LINK);
        let xlink = self.out.add_prefix("xlink", names::NS_XLINK);
        let container =
            self.out
                .add_element("footnoteLink", None, Some(&link), Some(names::NS_LINK))?;
        self.out.add_attr(
            "type",
            "extended",
            Some(container),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;
        self.out.add_attr(
            "role",
            link_role,
            Some(container),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;

        if to_node.is_footnote() {
            self.emit_footnote_resource(to_node, container)?;
        } else {
            // A fact-to-fact relationship: point a locator at the referenced
            // fact, copying it into this target if it is not already here.
            self.emit_loc(container, to_ref, "footnote")?;
            if !self.emitted_ids.contains(to_ref) {
                let root = self.out.root()?;
                self.emit_fact(to_node, root)?;
            }
        }

        let active = groups.iter().filter(|g| !g.from_refs.is_empty()).count();
        let mut group_number = 0;
        for group in groups {
            if group.from_refs.is_empty() {
                continue;
            }
            group_number += 1;
            let label = if active > 1 {
                format!("fact{}", group_number)
            } else {
                "fact".to_string()
            };
            for from_ref in &group.from_refs {
                self.emit_loc(container, from_ref, &label)?;
            }
            let arc = self.out.add_element(
                "footnoteArc",
                Some(container),
                Some(&link),
                Some(names::NS_LINK),
            )?;
            self.out.add_attr(
                "type",
                "arc",
                Some(arc),
                Some(&xlink),
                Some(names::NS_XLINK),
            )?;
            self.out.add_attr(
                "arcrole",
                &group.arc_role,
                Some(arc),
                Some(&xlink),
                Some(names::NS_XLINK),
            )?;
            self.out
                .add_attr("from", &label, Some(arc), Some(&xlink), Some(names::NS_XLINK))?;
            self.out
                .add_attr("to", "footnote", Some(arc), Some(&xlink), Some(names::NS_XLINK))?;
            if let Some(order) = &group.order {
                self.out.add_attr("order", order, Some(arc), None, None)?;
            }
        }
        self.summary.footnote_links += 1;
        Ok(())
    }

    fn emit_loc(
        &mut self,
        container: NodeId,
        id: &str,
        label: &str,
    ) -> Result<(), ExtractError> {
        let link = self.out.add_prefix("link", names::NS_LINK);
        let xlink = self.out.add_prefix("xlink", names::NS_XLINK);
        let loc = self
            .out
            .add_element("loc", Some(container), Some(&link), Some(names::NS_LINK))?;
        self.out.add_attr(
            "type",
            "locator",
            Some(loc),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;
        self.out.add_attr(
            "href",
            &format!("#{}", id),
            Some(loc),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;
        self.out
            .add_attr("label", label, Some(loc), Some(&xlink), Some(names::NS_XLINK))?;
        Ok(())
    }

    /// Emits the footnote resource itself: copied attributes, the xlink
    /// resource triple, ancestor-backfilled xml:lang and the footnote body
    /// as a markup fragment.
    fn emit_footnote_resource(
        &mut self,
        footnote: IxNode<'x, 'input>,
        container: NodeId,
    ) -> Result<(), ExtractError> {
        let link = self.out.add_prefix("link", names::NS_LINK);
        let xlink = self.out.add_prefix("xlink", names::NS_XLINK);
        let element = self.out.add_element(
            "footnote",
            Some(container),
            Some(&link),
            Some(names::NS_LINK),
        )?;

        for attr in footnote.node.attributes() {
            match attr.namespace() {
                Some(ans) if names::is_ix_ns(ans) => continue,
                Some(ans) if ans == names::NS_XML && attr.name() == "base" => continue,
                Some(ans) => {
                    let p = if ans == names::NS_XML {
                        "xml".to_string()
                    } else {
                        let p = footnote.node.lookup_prefix(ans).unwrap_or("");
                        self.out.add_prefix(p, ans)
                    };
                    self.out
                        .add_attr(attr.name(), attr.value(), Some(element), Some(&p), Some(ans))?;
                }
                None => {
                    if names::is_control_attr(attr.name()) || attr.name() == "title" {
                        continue;
                    }
                    self.out
                        .add_attr(attr.name(), attr.value(), Some(element), None, None)?;
                }
            }
        }

        self.out.add_attr(
            "type",
            "resource",
            Some(element),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;
        self.out.add_attr(
            "label",
            "footnote",
            Some(element),
            Some(&xlink),
            Some(names::NS_XLINK),
        )?;
        let role = footnote
            .attr("footnoteRole")
            .unwrap_or(names::ROLE_FOOTNOTE);
        self.out
            .add_attr("role", role, Some(element), Some(&xlink), Some(names::NS_XLINK))?;
        if let Some(title) = footnote.attr("title") {
            self.out
                .add_attr("title", title, Some(element), Some(&xlink), Some(names::NS_XLINK))?;
        }

        if footnote.node.attribute((names::NS_XML, "lang")).is_none() {
            // Back-fill the language from the nearest structural ancestor.
            let inherited = footnote
                .node
                .ancestors()
                .skip(1)
                .find_map(|a| a.attribute((names::NS_XML, "lang")));
            if let Some(lang) = inherited {
                let xml = self.out.add_prefix("xml", names::NS_XML);
                self.out
                    .add_attr("lang", lang, Some(element), Some(&xml), Some(names::NS_XML))?;
            }
        }

        format::copy_markup(footnote.node, &mut self.out, element)?;
        Ok(())
    }
}
