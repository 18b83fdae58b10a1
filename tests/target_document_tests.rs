use ixtract::{extract_all, SourceDoc, SourceIndex, TargetAssembler};
use std::collections::HashSet;
use std::fs;
use url::Url;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const REPORT: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"
    xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
    xmlns:ixt="http://www.xbrl.org/inlineXBRL/transformation/2015-02-26"
    xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:link="http://www.xbrl.org/2003/linkbase"
    xmlns:xlink="http://www.w3.org/1999/xlink"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:dei="http://xbrl.sec.gov/dei/2023"
    xmlns:acme="http://acme.example.com/2023">
  <body>
    <ix:header>
      <ix:references>
        <link:schemaRef xlink:type="simple" xlink:href="acme-2023.xsd"/>
      </ix:references>
      <ix:references target="sec">
        <link:schemaRef xlink:type="simple" xlink:href="https://sec.example.com/dei-2023.xsd"/>
      </ix:references>
      <ix:resources>
        <xbrli:context id="c1">
          <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000123</xbrli:identifier></xbrli:entity>
          <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
        </xbrli:context>
        <xbrli:context id="c2">
          <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000123</xbrli:identifier></xbrli:entity>
          <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
        </xbrli:context>
        <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
        <ix:relationship fromRefs="f1" toRefs="fn1" order="1"/>
        <ix:relationship fromRefs="f2" toRefs="fn1"
            arcrole="http://acme.example.com/arcrole/explains"/>
      </ix:resources>
    </ix:header>
    <div xml:lang="en-US">
      <ix:nonFraction id="f1" name="acme:Revenue" contextRef="c1" unitRef="usd"
          scale="6" decimals="-6">1,234</ix:nonFraction>
      <ix:nonFraction id="f2" name="acme:Costs" contextRef="c1" unitRef="usd">500</ix:nonFraction>
      <ix:nonNumeric id="s1" name="dei:DocumentType" contextRef="c2" target="sec">10-K</ix:nonNumeric>
      <ix:footnote id="fn1"><p>Includes discontinued operations.</p></ix:footnote>
    </div>
  </body>
</html>"#;

fn assemble_report(target: &str) -> String {
    init_logging();
    let base = Url::parse("https://filings.example.com/acme/2023/report.xhtml").unwrap();
    let docs = vec![SourceDoc::parse(REPORT, Some(base)).unwrap()];
    let index = SourceIndex::build(&docs);
    TargetAssembler::assemble(&index, target)
        .unwrap()
        .document
        .to_xml()
        .unwrap()
}

#[test]
fn test_extract_all_yields_one_document_per_target() {
    init_logging();
    let docs = vec![SourceDoc::parse(REPORT, None).unwrap()];
    let index = SourceIndex::build(&docs);
    let results = extract_all(&index);
    let targets: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(targets, vec!["", "sec"]);
    for (_, result) in &results {
        assert!(result.is_ok());
    }
}

#[test]
fn test_default_target_partition() {
    let xml = assemble_report("");
    assert!(xml.contains("<acme:Revenue"));
    assert!(xml.contains("<acme:Costs"));
    // The sec-targeted fact stays out of the default instance.
    assert!(!xml.contains("DocumentType"));
    // Scale applied: 1,234 * 10^6.
    assert!(xml.contains(">1234000000<"));
    // decimals is an ordinary attribute and survives.
    assert!(xml.contains("decimals=\"-6\""));
}

#[test]
fn test_secondary_target_partition() {
    let xml = assemble_report("sec");
    assert!(xml.contains("<dei:DocumentType"));
    assert!(xml.contains(">10-K<"));
    assert!(!xml.contains("acme:Revenue"));
    assert!(!xml.contains("footnoteLink"));
}

#[test]
fn test_schema_ref_resolved_against_base_uri() {
    let xml = assemble_report("");
    assert!(xml.contains("xlink:href=\"https://filings.example.com/acme/2023/acme-2023.xsd\""));

    // Absolute hrefs pass through the join unchanged.
    let sec = assemble_report("sec");
    assert!(sec.contains("xlink:href=\"https://sec.example.com/dei-2023.xsd\""));
    assert!(!sec.contains("acme-2023.xsd"));
}

#[test]
fn test_resource_pruning_per_target() {
    let xml = assemble_report("");
    assert!(xml.contains("id=\"c1\""));
    assert!(!xml.contains("id=\"c2\""));
    assert!(xml.contains("id=\"usd\""));

    let sec = assemble_report("sec");
    assert!(sec.contains("id=\"c2\""));
    assert!(!sec.contains("id=\"c1\""));
    assert!(!sec.contains("id=\"usd\""));
}

#[test]
fn test_inline_namespaces_never_leak() {
    for target in ["", "sec"] {
        let xml = assemble_report(target);
        assert!(!xml.contains("inlineXBRL"));
        assert!(xml.contains("xmlns:xbrli=\"http://www.xbrl.org/2003/instance\""));
    }
}

// One footnote referenced under two distinct arc roles: two locator/arc
// pairs labelled fact1 and fact2, numbering local to the toRef.
#[test]
fn test_footnote_with_two_arc_roles() {
    let xml = assemble_report("");
    assert!(xml.contains("<link:footnoteLink"));
    assert!(xml.contains("xlink:role=\"http://www.xbrl.org/2003/role/link\""));
    assert!(xml.contains("xlink:href=\"#f1\" xlink:label=\"fact1\""));
    assert!(xml.contains("xlink:href=\"#f2\" xlink:label=\"fact2\""));
    assert!(xml.contains("xlink:arcrole=\"http://www.xbrl.org/2003/arcrole/fact-footnote\""));
    assert!(xml.contains("xlink:arcrole=\"http://acme.example.com/arcrole/explains\""));
    assert!(xml.contains("xlink:from=\"fact1\" xlink:to=\"footnote\" order=\"1\""));
    assert!(xml.contains("xlink:from=\"fact2\" xlink:to=\"footnote\""));
    assert_eq!(xml.matches("<link:footnoteLink").count(), 1);
}

#[test]
fn test_footnote_resource_content_and_lang() {
    let xml = assemble_report("");
    // Body copied as markup; xhtml elements carry the xhtml prefix and the
    // declaration lands on the root.
    assert!(xml.contains("xmlns:xhtml=\"http://www.w3.org/1999/xhtml\""));
    assert!(xml.contains("<xhtml:p>Includes discontinued operations.</xhtml:p>"));
    // xml:lang inherited from the enclosing div.
    assert!(xml.contains("xml:lang=\"en-US\""));
    assert!(xml.contains("xlink:role=\"http://www.xbrl.org/2003/role/footnote\""));
    assert!(xml.contains("xlink:label=\"footnote\""));
}

// Context/unit usage re-extracted from the assembled output must equal the
// usage computed from the input facts of that target.
#[test]
fn test_context_and_unit_usage_round_trip() {
    let xml = assemble_report("");
    let doc = roxmltree::Document::parse(&xml).unwrap();

    let mut referenced: HashSet<String> = HashSet::new();
    let mut declared: HashSet<String> = HashSet::new();
    for node in doc.root_element().descendants().filter(|n| n.is_element()) {
        if let Some(ctx) = node.attribute("contextRef") {
            referenced.insert(ctx.to_string());
        }
        if let Some(unit) = node.attribute("unitRef") {
            referenced.insert(unit.to_string());
        }
        let local = node.tag_name().name();
        if local == "context" || local == "unit" {
            if let Some(id) = node.attribute("id") {
                declared.insert(id.to_string());
            }
        }
    }
    assert_eq!(referenced, declared);
    assert_eq!(
        declared,
        HashSet::from(["c1".to_string(), "usd".to_string()])
    );
}

// Two siblings sharing order and trimmed text collapse to one.
#[test]
fn test_duplicate_sibling_collapsed() {
    init_logging();
    let source = r#"<html xmlns="http://www.w3.org/1999/xhtml"
        xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
        xmlns:acme="http://acme.example.com/2023">
      <body>
        <ix:tuple name="acme:Holding">
          <ix:nonNumeric name="acme:Amount" contextRef="c" order="1">100</ix:nonNumeric>
          <ix:nonNumeric name="acme:Amount" contextRef="c" order="1">
            100
          </ix:nonNumeric>
        </ix:tuple>
      </body>
    </html>"#;
    let docs = vec![SourceDoc::parse(source, None).unwrap()];
    let index = SourceIndex::build(&docs);
    let xml = TargetAssembler::assemble(&index, "")
        .unwrap()
        .document
        .to_xml()
        .unwrap();
    assert_eq!(xml.matches("<acme:Amount").count(), 1);
}

// A fact redirected by tupleRef lands under the tuple that declares the
// matching tupleID, not at its structural position.
#[test]
fn test_tuple_ref_redirection() {
    init_logging();
    let source = r#"<html xmlns="http://www.w3.org/1999/xhtml"
        xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
        xmlns:acme="http://acme.example.com/2023">
      <body>
        <div><ix:tuple name="acme:Holding" tupleID="T1"/></div>
        <table><td>
          <ix:nonNumeric name="acme:Owner" contextRef="c" tupleRef="T1" order="1">Alice</ix:nonNumeric>
        </td></table>
      </body>
    </html>"#;
    let docs = vec![SourceDoc::parse(source, None).unwrap()];
    let index = SourceIndex::build(&docs);
    let xml = TargetAssembler::assemble(&index, "")
        .unwrap()
        .document
        .to_xml()
        .unwrap();
    let start = xml.find("<acme:Holding>").unwrap();
    let end = xml.find("</acme:Holding>").unwrap();
    let owner = xml.find("<acme:Owner").unwrap();
    assert!(owner > start && owner < end);
}

// A relationship whose only fromRef belongs to another target contributes
// nothing to the requesting target.
#[test]
fn test_foreign_target_from_ref_filtered() {
    init_logging();
    let source = r#"<html xmlns="http://www.w3.org/1999/xhtml"
        xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
        xmlns:acme="http://acme.example.com/2023">
      <body>
        <ix:nonNumeric id="f1" name="acme:Note" contextRef="c" target="other">x</ix:nonNumeric>
        <ix:footnote id="fn1">note text</ix:footnote>
        <ix:relationship fromRefs="f1" toRefs="fn1"/>
      </body>
    </html>"#;
    let docs = vec![SourceDoc::parse(source, None).unwrap()];
    let index = SourceIndex::build(&docs);
    let xml = TargetAssembler::assemble(&index, "")
        .unwrap()
        .document
        .to_xml()
        .unwrap();
    assert!(!xml.contains("footnoteLink"));
    assert!(!xml.contains("footnoteArc"));

    let other = TargetAssembler::assemble(&index, "other")
        .unwrap()
        .document
        .to_xml()
        .unwrap();
    assert!(other.contains("<link:footnoteLink"));
    assert!(other.contains("xlink:href=\"#f1\" xlink:label=\"fact\""));
}

// A fact-to-fact relationship points a locator at the referenced fact and
// does not duplicate it when it already belongs to the target.
#[test]
fn test_fact_to_fact_relationship_locator() {
    init_logging();
    let source = r#"<html xmlns="http://www.w3.org/1999/xhtml"
        xmlns:ix="http://www.xbrl.org/2013/inlineXBRL"
        xmlns:acme="http://acme.example.com/2023">
      <body>
        <ix:nonNumeric id="f1" name="acme:Summary" contextRef="c">summary</ix:nonNumeric>
        <ix:nonNumeric id="f2" name="acme:Detail" contextRef="c">detail</ix:nonNumeric>
        <ix:relationship fromRefs="f1" toRefs="f2"
            arcrole="http://www.xbrl.org/2009/arcrole/fact-explanatoryFact"/>
      </body>
    </html>"#;
    let docs = vec![SourceDoc::parse(source, None).unwrap()];
    let index = SourceIndex::build(&docs);
    let xml = TargetAssembler::assemble(&index, "")
        .unwrap()
        .document
        .to_xml()
        .unwrap();
    assert!(xml.contains("xlink:href=\"#f2\" xlink:label=\"footnote\""));
    assert_eq!(xml.matches("<acme:Detail").count(), 1);
    assert!(xml.contains("fact-explanatoryFact"));
}

#[test]
fn test_written_document_reparses() {
    init_logging();
    let base = Url::parse("https://filings.example.com/acme/2023/report.xhtml").unwrap();
    let docs = vec![SourceDoc::parse(REPORT, Some(base)).unwrap()];
    let index = SourceIndex::build(&docs);
    let assembled = TargetAssembler::assemble(&index, "").unwrap();
    let xml = assembled.document.to_xml().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acme-2023.xml");
    fs::write(&path, &xml).unwrap();

    let round = fs::read_to_string(&path).unwrap();
    let doc = roxmltree::Document::parse(&round).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "xbrl");
    assert_eq!(
        root.tag_name().namespace(),
        Some("http://www.xbrl.org/2003/instance")
    );
    assert_eq!(assembled.summary.facts, 2);
    assert_eq!(assembled.summary.contexts, 1);
    assert_eq!(assembled.summary.units, 1);
    assert_eq!(assembled.summary.footnote_links, 1);
}
