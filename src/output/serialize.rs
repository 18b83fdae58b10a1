//! Serializes an [`OutputDocument`] through the quick-xml event writer.
//!
//! Namespace declarations are emitted on the root element only; every other
//! element just carries its resolved prefix.

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{NodeId, OutNode, OutputDocument};

impl OutputDocument {
    /// Renders the document as a UTF-8 XML string with an XML declaration
    /// and two-space indentation.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let root = self.root()?;
        self.write_node(&mut writer, root, true)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId, is_root: bool) -> Result<()> {
        match self.node(id) {
            OutNode::Element {
                prefix,
                ns,
                name,
                attrs,
                children,
                ..
            } => {
                let qname = self.qualified(prefix.as_deref(), ns.as_deref(), name);
                let mut start = BytesStart::new(qname.clone());
                if is_root {
                    for (p, uri) in self.prefixes() {
                        // xml: is implicitly bound and must not be declared.
                        if p == "xml" {
                            continue;
                        }
                        start.push_attribute((format!("xmlns:{}", p).as_str(), uri.as_str()));
                    }
                }
                for attr in attrs {
                    let aname = match self.attr_prefix(attr) {
                        Some(p) => format!("{}:{}", p, attr.name),
                        None => attr.name.clone(),
                    };
                    start.push_attribute((aname.as_str(), attr.value.as_str()));
                }
                if children.is_empty() {
                    writer.write_event(Event::Empty(start))?;
                } else {
                    writer.write_event(Event::Start(start))?;
                    for child in children {
                        self.write_node(writer, *child, false)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(qname)))?;
                }
            }
            OutNode::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            OutNode::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::new(text)))?;
            }
        }
        Ok(())
    }

    fn qualified(&self, prefix: Option<&str>, ns: Option<&str>, name: &str) -> String {
        let effective = prefix.or_else(|| ns.and_then(|uri| self.prefix_for(uri)));
        match effective {
            Some(p) if !p.is_empty() => format!("{}:{}", p, name),
            _ => name.to_string(),
        }
    }

    fn attr_prefix(&self, attr: &super::OutAttr) -> Option<String> {
        match (&attr.prefix, &attr.ns) {
            (Some(p), _) => Some(p.clone()),
            (None, Some(uri)) => self.prefix_for(uri).map(str::to_string),
            (None, None) => None,
        }
    }
}
