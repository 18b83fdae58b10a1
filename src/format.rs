//! Content Formatter façade.
//!
//! Renders the value of an inline fact for the extracted instance: plain
//! text is NFKC-normalized with collapsed whitespace, `escape="true"`
//! non-numeric content keeps its inner markup serialized as text, and
//! non-fraction values get the `sign` and `scale` rewrites applied.
//! Transformation-registry `format` lookups are taxonomy territory and are
//! left to the taxonomy collaborator.

use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Node;
use unicode_normalization::UnicodeNormalization;

use crate::error::ExtractError;
use crate::names;
use crate::output::{NodeId, OutputDocument};

static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Collapses internal whitespace, trims and NFKC-normalizes. This is also
/// the key used for sibling dedup, so it must stay a pure string rewrite:
/// "100" and "100.0" are distinct on purpose.
pub fn normalize_text(text: &str) -> String {
    WS.replace_all(text, " ").trim().nfkc().collect()
}

/// Normalized raw text of a fact element, the sibling-dedup key: trimmed,
/// whitespace-collapsed, NFKC, with `ix:exclude` subtrees skipped and no
/// sign/scale rewriting.
pub fn raw_text(node: Node) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    normalize_text(&text)
}

/// The renderable value of a fact element.
pub fn fact_value(node: Node) -> String {
    let escaped = node
        .attribute("escape")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if escaped {
        let mut out = String::new();
        for child in node.children() {
            serialize_node(child, &mut out);
        }
        return out.trim().to_string();
    }

    let mut text = String::new();
    collect_text(node, &mut text);
    let value = normalize_text(&text);

    let name = node.tag_name().name();
    if name == names::TAG_NON_FRACTION
        || name == names::TAG_NUMERATOR
        || name == names::TAG_DENOMINATOR
    {
        let negate = node.attribute("sign").map(|s| s == "-").unwrap_or(false);
        let scale = node
            .attribute("scale")
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(0);
        return numeric_value(&value, negate, scale);
    }
    value
}

/// Applies sign and scale to a numeric lexical value. The shift is done on
/// the digit string, never through floats, so no precision is lost.
/// Non-numeric input is passed through untouched.
pub fn numeric_value(raw: &str, negate: bool, scale: i32) -> String {
    let cleaned = raw.replace(',', "");
    if cleaned.parse::<f64>().is_err() {
        return raw.to_string();
    }
    let shifted = shift_decimal(&cleaned, scale);
    if negate && !shifted.starts_with('-') && shifted.chars().any(|c| c != '0' && c != '.') {
        format!("-{}", shifted)
    } else {
        shifted
    }
}

fn shift_decimal(value: &str, scale: i32) -> String {
    if scale == 0 {
        return value.to_string();
    }
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (digits.to_string(), String::new()),
    };
    let mut all: Vec<char> = int_part.chars().chain(frac_part.chars()).collect();
    let mut point = int_part.len() as i32 + scale;
    while point > all.len() as i32 {
        all.push('0');
    }
    while point < 0 {
        all.insert(0, '0');
        point += 1;
    }
    let point = point as usize;
    let int_digits: String = all[..point].iter().collect();
    let frac_digits: String = all[point..].iter().collect();
    let int_digits = {
        let trimmed = int_digits.trim_start_matches('0');
        if trimmed.is_empty() { "0" } else { trimmed }.to_string()
    };
    let frac_digits = frac_digits.trim_end_matches('0');
    if frac_digits.is_empty() {
        format!("{}{}", sign, int_digits)
    } else {
        format!("{}{}.{}", sign, int_digits, frac_digits)
    }
}

/// Gathers descendant text, skipping `ix:exclude` subtrees and any nested
/// inline fact markup's control elements.
fn collect_text(node: Node, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or(""));
        } else if child.is_element() {
            let ns = child.tag_name().namespace().unwrap_or("");
            if names::is_ix_ns(ns) && child.tag_name().name() == names::TAG_EXCLUDE {
                continue;
            }
            collect_text(child, out);
        }
    }
}

/// Serializes a source subtree to text, used for `escape="true"` content.
/// roxmltree hands back unescaped values, so special characters must be
/// re-escaped for the rebuilt markup to stay well formed.
fn serialize_node(node: Node, out: &mut String) {
    if node.is_text() {
        push_escaped(node.text().unwrap_or(""), false, out);
        return;
    }
    if !node.is_element() {
        return;
    }
    let ns = node.tag_name().namespace().unwrap_or("");
    if names::is_ix_ns(ns) && node.tag_name().name() == names::TAG_EXCLUDE {
        return;
    }
    let name = node.tag_name().name();
    out.push('<');
    out.push_str(name);
    for attr in node.attributes() {
        if attr.namespace().map(names::is_ix_ns).unwrap_or(false) {
            continue;
        }
        out.push(' ');
        out.push_str(attr.name());
        out.push_str("=\"");
        push_escaped(attr.value(), true, out);
        out.push('"');
    }
    let mut children = node.children().peekable();
    if children.peek().is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in node.children() {
        serialize_node(child, out);
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped(text: &str, in_attr: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Deep-copies a footnote body into the output arena under `parent`.
/// Inline control elements are dropped; element namespaces are registered
/// on the root as they are encountered, xhtml content under the `xhtml`
/// prefix.
pub fn copy_markup(
    node: Node,
    out: &mut OutputDocument,
    parent: NodeId,
) -> Result<(), ExtractError> {
    for child in node.children() {
        if child.is_text() {
            if let Some(text) = child.text() {
                if !text.is_empty() {
                    out.add_content(text, parent)?;
                }
            }
        } else if child.is_element() {
            let ns = child.tag_name().namespace();
            if ns.map(names::is_ix_ns).unwrap_or(false) {
                // ix:exclude is dropped wholesale; any other stray inline
                // element contributes its children only.
                if child.tag_name().name() != names::TAG_EXCLUDE {
                    copy_markup(child, out, parent)?;
                }
                continue;
            }
            let prefix = match ns {
                Some(uri) if uri == names::NS_XHTML => Some(out.add_prefix("xhtml", uri)),
                Some(uri) => {
                    let source_prefix = child.lookup_prefix(uri).unwrap_or("");
                    Some(out.add_prefix(source_prefix, uri))
                }
                None => None,
            };
            let element = out.add_element(
                child.tag_name().name(),
                Some(parent),
                prefix.as_deref(),
                ns,
            )?;
            for attr in child.attributes() {
                if attr.namespace().map(names::is_ix_ns).unwrap_or(false) {
                    continue;
                }
                let aprefix = if attr.namespace() == Some(names::NS_XML) {
                    Some("xml")
                } else {
                    None
                };
                out.add_attr(attr.name(), attr.value(), Some(element), aprefix, attr.namespace())?;
            }
            copy_markup(child, out, element)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_collapses_and_trims() {
        assert_eq!(normalize_text("  1\n 000 "), "1 000");
        assert_eq!(normalize_text("100"), "100");
        // Normalized strings only; no numeric equivalence.
        assert_ne!(normalize_text("100"), normalize_text("100.0"));
    }

    #[test]
    fn test_numeric_value_scale() {
        assert_eq!(numeric_value("1,234", false, 3), "1234000");
        assert_eq!(numeric_value("12.5", false, 2), "1250");
        assert_eq!(numeric_value("45", false, -2), "0.45");
        assert_eq!(numeric_value("45", true, 0), "-45");
        assert_eq!(numeric_value("0", true, 0), "0");
        assert_eq!(numeric_value("n/a", true, 3), "n/a");
    }

    #[test]
    fn test_fact_value_honors_exclude_and_escape() {
        let source = r#"<root xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">
            <ix:nonNumeric name="a:b">kept <ix:exclude>dropped</ix:exclude>too</ix:nonNumeric>
            <ix:nonNumeric name="a:c" escape="true"><p>rich <b>text</b></p></ix:nonNumeric>
        </root>"#;
        let doc = roxmltree::Document::parse(source).unwrap();
        let mut facts = doc
            .root_element()
            .descendants()
            .filter(|n| n.has_tag_name((crate::names::NS_IX_2013, "nonNumeric")));
        let plain = facts.next().unwrap();
        let escaped = facts.next().unwrap();
        assert_eq!(fact_value(plain), "kept too");
        assert_eq!(fact_value(escaped), "<p>rich <b>text</b></p>");
    }

    #[test]
    fn test_escaped_markup_reescapes_special_characters() {
        let source = r#"<root xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">
            <ix:nonNumeric name="a:b" escape="true"><p title="a &amp; &quot;b&quot;">x &lt; y</p></ix:nonNumeric>
        </root>"#;
        let doc = roxmltree::Document::parse(source).unwrap();
        let fact = doc
            .root_element()
            .descendants()
            .find(|n| n.has_tag_name((crate::names::NS_IX_2013, "nonNumeric")))
            .unwrap();
        assert_eq!(
            fact_value(fact),
            r#"<p title="a &amp; &quot;b&quot;">x &lt; y</p>"#
        );
    }
}
