//! Namespace URIs, tag names and attribute sets used by the extraction engine.

/// XBRL instance namespace, the namespace of the output root element.
pub const NS_XBRLI: &str = "http://www.xbrl.org/2003/instance";
pub const NS_LINK: &str = "http://www.xbrl.org/2003/linkbase";
pub const NS_XLINK: &str = "http://www.w3.org/1999/xlink";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const NS_XHTML: &str = "http://www.w3.org/1999/xhtml";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// Inline XBRL markup namespaces (1.0 and 1.1).
pub const NS_IX_2008: &str = "http://www.xbrl.org/2008/inlineXBRL";
pub const NS_IX_2013: &str = "http://www.xbrl.org/2013/inlineXBRL";

/// Transformation registry namespaces. Declared on inline source roots but
/// never used by the extracted instance.
pub const NS_IXT: &[&str] = &[
    "http://www.xbrl.org/inlineXBRL/transformation/2010-04-20",
    "http://www.xbrl.org/inlineXBRL/transformation/2011-07-31",
    "http://www.xbrl.org/inlineXBRL/transformation/2015-02-26",
    "http://www.xbrl.org/inlineXBRL/transformation/2020-02-12",
    "http://www.xbrl.org/inlineXBRL/transformation/2022-02-16",
    "http://www.sec.gov/inlineXBRL/transformation/2015-08-31",
];

pub const ROLE_LINK: &str = "http://www.xbrl.org/2003/role/link";
pub const ROLE_FOOTNOTE: &str = "http://www.xbrl.org/2003/role/footnote";
pub const ARCROLE_FACT_FOOTNOTE: &str = "http://www.xbrl.org/2003/arcrole/fact-footnote";

// Inline element local names the index is built over.
pub const TAG_REFERENCES: &str = "references";
pub const TAG_RESOURCES: &str = "resources";
pub const TAG_EXCLUDE: &str = "exclude";
pub const TAG_FRACTION: &str = "fraction";
pub const TAG_NON_FRACTION: &str = "nonFraction";
pub const TAG_NON_NUMERIC: &str = "nonNumeric";
pub const TAG_NUMERATOR: &str = "numerator";
pub const TAG_DENOMINATOR: &str = "denominator";
pub const TAG_TUPLE: &str = "tuple";
pub const TAG_FOOTNOTE: &str = "footnote";
pub const TAG_RELATIONSHIP: &str = "relationship";
pub const TAG_CONTEXT: &str = "context";
pub const TAG_UNIT: &str = "unit";
pub const TAG_ROLE_REF: &str = "roleRef";
pub const TAG_ARCROLE_REF: &str = "arcroleRef";

/// Local names of inline elements that carry fact content.
pub const FACT_TAGS: &[&str] = &[TAG_FRACTION, TAG_NON_FRACTION, TAG_NON_NUMERIC];

/// Control attributes of the inline markup. These drive extraction and are
/// never copied onto output elements. `contextRef` and `unitRef` are handled
/// separately because unitRef is only valid on numeric facts.
pub const CONTROL_ATTRS: &[&str] = &[
    "name",
    "escape",
    "format",
    "scale",
    "sign",
    "target",
    "order",
    "tupleID",
    "tupleId",
    "tupleRef",
    "continuedAt",
    "continuationFrom",
    "footnoteRole",
    "arcrole",
    "linkRole",
    "fromRefs",
    "toRefs",
    "contextRef",
    "unitRef",
];

/// True for the inline markup namespaces themselves.
pub fn is_ix_ns(ns: &str) -> bool {
    ns == NS_IX_2008 || ns == NS_IX_2013
}

/// Namespaces that must not leak into the extracted instance.
pub fn is_excluded_ns(ns: &str) -> bool {
    is_ix_ns(ns) || NS_IXT.contains(&ns)
}

pub fn is_control_attr(name: &str) -> bool {
    CONTROL_ATTRS.contains(&name)
}
