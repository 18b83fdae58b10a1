//! Tuple Hierarchy Resolver.
//!
//! Rebuilds parent/child trees from the flat classified fact queues:
//! siblings sort by ascending numeric order with encounter-order ties,
//! duplicate `(order, normalized text)` non-nil siblings collapse to the
//! first occurrence, and each emitted tuple recurses into its own queue.

use std::collections::HashMap;

use crate::error::ExtractError;
use crate::format;
use crate::index::IxNode;
use crate::names;
use crate::output::NodeId;

use super::TargetAssembler;

impl<'a, 'x, 'input> TargetAssembler<'a, 'x, 'input> {
    /// Emits one level of siblings under `parent` and recurses into the
    /// queues of any tuple among them.
    pub(crate) fn resolve_level(
        &mut self,
        mut siblings: Vec<IxNode<'x, 'input>>,
        parent: NodeId,
        queues: &HashMap<(usize, usize), Vec<IxNode<'x, 'input>>>,
    ) -> Result<(), ExtractError> {
        // Stable sort: equal orders keep encounter order, never name or id.
        siblings.sort_by(|a, b| {
            a.order()
                .partial_cmp(&b.order())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut seen: Vec<(f64, String)> = Vec::new();
        for sibling in siblings {
            let text = format::raw_text(sibling.node);
            if !sibling.is_nil() {
                let order = sibling.order();
                if seen.iter().any(|(o, t)| *o == order && *t == text) {
                    log::debug!(
                        "dropping duplicate sibling {:?} (order {}, text {:?})",
                        sibling.name(),
                        order,
                        text
                    );
                    continue;
                }
                seen.push((order, text));
            }

            let element = match self.emit_fact(sibling, parent)? {
                Some(element) => element,
                None => continue,
            };
            if sibling.is_tuple() {
                if let Some(children) = queues.get(&sibling.key()) {
                    self.resolve_level(children.clone(), element, queues)?;
                }
            }
        }
        Ok(())
    }

    /// Emits one fact or tuple element under `parent`: concept qname from
    /// the `name` attribute, contextRef (plus unitRef for numeric kinds),
    /// surviving original attributes, and the formatted content.
    ///
    /// Returns `Ok(None)` when the fact degrades gracefully (unresolvable
    /// concept, missing fraction component); only structural contract
    /// violations propagate as errors.
    pub(crate) fn emit_fact(
        &mut self,
        fact: IxNode<'x, 'input>,
        parent: NodeId,
    ) -> Result<Option<NodeId>, ExtractError> {
        let qname = match fact.name() {
            Some(name) => name,
            None => {
                log::warn!("{} without a name attribute; dropped", fact.local_name());
                return Ok(None);
            }
        };
        let (source_prefix, local) = match qname.split_once(':') {
            Some((p, l)) => (Some(p), l),
            None => (None, qname),
        };
        let ns = match fact.node.lookup_namespace_uri(source_prefix) {
            Some(ns) => ns,
            None => {
                log::warn!("cannot resolve namespace of concept {:?}; dropped", qname);
                return Ok(None);
            }
        };

        // Fraction components are located before any output is created so a
        // failed lookup leaves no half-built element behind.
        let fraction = if fact.local_name() == names::TAG_FRACTION {
            match self.locate_fraction_components(fact, qname) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    log::warn!("{}", e);
                    return Ok(None);
                }
            }
        } else {
            None
        };

        let prefix = self.out.add_prefix(source_prefix.unwrap_or(""), ns);
        let element = self
            .out
            .add_element(local, Some(parent), Some(&prefix), Some(ns))?;

        if let Some(context) = fact.context_ref() {
            self.out
                .add_attr("contextRef", context, Some(element), None, None)?;
            self.used_refs.insert(context.to_string());
        }
        let numeric = fact.local_name() == names::TAG_NON_FRACTION
            || fact.local_name() == names::TAG_FRACTION;
        if numeric {
            if let Some(unit) = fact.unit_ref() {
                self.out
                    .add_attr("unitRef", unit, Some(element), None, None)?;
                self.used_refs.insert(unit.to_string());
            }
        }
        self.copy_fact_attrs(fact, element)?;

        if let Some(id) = fact.id() {
            self.emitted_ids.insert(id.to_string());
        }

        match (fact.is_tuple(), fraction) {
            (true, _) => {
                self.summary.tuples += 1;
            }
            (false, Some((numerator, denominator))) => {
                self.emit_fraction_component(names::TAG_NUMERATOR, numerator, element)?;
                self.emit_fraction_component(names::TAG_DENOMINATOR, denominator, element)?;
                self.summary.facts += 1;
            }
            (false, None) => {
                let value = format::fact_value(fact.node);
                if !value.is_empty() {
                    self.out.add_content(&value, element)?;
                }
                self.summary.facts += 1;
            }
        }
        Ok(Some(element))
    }

    fn copy_fact_attrs(
        &mut self,
        fact: IxNode<'x, 'input>,
        element: NodeId,
    ) -> Result<(), ExtractError> {
        for attr in fact.node.attributes() {
            match attr.namespace() {
                Some(ans) if names::is_ix_ns(ans) => continue,
                Some(ans) if ans == names::NS_XML && attr.name() == "base" => continue,
                Some(ans) => {
                    let p = if ans == names::NS_XML {
                        "xml".to_string()
                    } else {
                        let p = fact.node.lookup_prefix(ans).unwrap_or("");
                        self.out.add_prefix(p, ans)
                    };
                    self.out
                        .add_attr(attr.name(), attr.value(), Some(element), Some(&p), Some(ans))?;
                }
                None => {
                    if names::is_control_attr(attr.name()) {
                        continue;
                    }
                    self.out
                        .add_attr(attr.name(), attr.value(), Some(element), None, None)?;
                }
            }
        }
        Ok(())
    }

    /// Finds the numerator and denominator of a fraction fact among the
    /// default target's candidate pools. A candidate qualifies only when the
    /// fraction element is a genuine structural ancestor; the first
    /// qualifying match wins, distance is not a tie-break.
    fn locate_fraction_components(
        &self,
        fact: IxNode<'x, 'input>,
        qname: &str,
    ) -> Result<(IxNode<'x, 'input>, IxNode<'x, 'input>), ExtractError> {
        let numerator = self.locate_component(fact, names::TAG_NUMERATOR).ok_or(
            ExtractError::MissingFractionComponent {
                name: qname.to_string(),
                component: "numerator",
            },
        )?;
        let denominator = self.locate_component(fact, names::TAG_DENOMINATOR).ok_or(
            ExtractError::MissingFractionComponent {
                name: qname.to_string(),
                component: "denominator",
            },
        )?;
        Ok((numerator, denominator))
    }

    fn locate_component(
        &self,
        fact: IxNode<'x, 'input>,
        tag: &str,
    ) -> Option<IxNode<'x, 'input>> {
        self.index
            .nodes_for_target("", tag)
            .iter()
            .find(|candidate| candidate.doc == fact.doc && fact.is_ancestor_of(candidate.node))
            .copied()
    }

    fn emit_fraction_component(
        &mut self,
        tag: &str,
        component: IxNode<'x, 'input>,
        parent: NodeId,
    ) -> Result<(), ExtractError> {
        let prefix = self.out.add_prefix("xbrli", names::NS_XBRLI);
        let element =
            self.out
                .add_element(tag, Some(parent), Some(&prefix), Some(names::NS_XBRLI))?;
        let value = format::fact_value(component.node);
        if !value.is_empty() {
            self.out.add_content(&value, element)?;
        }
        Ok(())
    }
}
