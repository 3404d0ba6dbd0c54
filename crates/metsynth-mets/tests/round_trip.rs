use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use metsynth_core::{
    Dataset, FILE, InputPaths, PARENT_ID, STRUCT_ID, STRUCTMAP, build_relationship_graph, key_of,
    load_dataset, reconcile,
};
use metsynth_generate::{ResamplingSynthesizer, SampleOptions, Synthesizer};
use metsynth_mets::{
    DocumentValidator, PackageOutline, ReassembledDocument, Reassembler, parse_document,
    to_xml_string,
};

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn sample_paths() -> InputPaths {
    let base = repo_root().join("data/sample");
    InputPaths {
        dmdsec_path: base.join("dmdSec.json"),
        file_path: base.join("file.json"),
        structmap_path: base.join("structMap.json"),
    }
}

fn schema_validator() -> DocumentValidator {
    let schemas = repo_root().join("schemas");
    let paths = BTreeMap::from([
        ("mets".to_string(), schemas.join("mets.schema.json")),
        ("dc".to_string(), schemas.join("dc.schema.json")),
    ]);
    DocumentValidator::load(&paths).expect("load schemas")
}

/// Load, fit, sample, reconcile and reassemble the bundled sample package.
fn synthesize(seed: u64) -> (Dataset, Dataset, ReassembledDocument) {
    let source = load_dataset(&sample_paths()).expect("load sample package");
    let graph = build_relationship_graph(&source).expect("graph");
    let (source, _) = reconcile(source, &graph).expect("reconcile source");

    let mut synthesizer = ResamplingSynthesizer::new();
    synthesizer.fit(&source, &graph).expect("fit");
    let options = SampleOptions {
        seed,
        num_rows: BTreeMap::new(),
        default_rows: 25,
    };
    let sampled = synthesizer.sample(&options).expect("sample");
    let (reconciled, _) = reconcile(sampled, &graph).expect("reconcile sample");

    let document = Reassembler::default()
        .reassemble(&reconciled, source.table(FILE))
        .expect("reassemble");
    (source, reconciled, document)
}

#[test]
fn source_package_round_trips() {
    let source = load_dataset(&sample_paths()).expect("load sample package");
    let graph = build_relationship_graph(&source).expect("graph");
    let (source, _) = reconcile(source, &graph).expect("reconcile");

    let document = Reassembler::default()
        .reassemble(&source, None)
        .expect("reassemble");
    let xml = to_xml_string(&document.root).expect("serialize");
    let parsed = parse_document(&xml).expect("parse");

    let outline = PackageOutline::from_document(&parsed).expect("outline");
    assert_eq!(outline, PackageOutline::from_document(&document.root).unwrap());

    let expected: BTreeSet<String> = source
        .table(STRUCTMAP)
        .unwrap()
        .rows
        .iter()
        .filter_map(|row| key_of(row, STRUCT_ID))
        .collect();
    assert_eq!(outline.struct_ids(), expected);
    assert_eq!(outline.file_ids, vec!["FILE1", "FILE2", "FILE3", "FILE4", "FILE5"]);
    assert_eq!(outline.roots(), vec!["DIV1", "DIV6", "DIV7"]);
    assert!(outline.edges().contains(&("DIV2".to_string(), "DIV4".to_string())));

    let div6 = outline
        .divisions
        .iter()
        .find(|div| div.id.as_deref() == Some("DIV6"))
        .unwrap();
    assert_eq!(div6.order.as_deref(), Some("3"));
    assert_eq!(div6.file_ids, vec!["FILE4"]);
    assert_eq!(document.report.orphans_promoted, 1);
}

#[test]
fn same_seed_yields_identical_document() {
    let (_, _, first) = synthesize(42);
    let (_, _, second) = synthesize(42);

    assert_eq!(
        to_xml_string(&first.root).unwrap(),
        to_xml_string(&second.root).unwrap()
    );
}

#[test]
fn synthesized_hierarchy_matches_reconciled_rows() {
    let (_, reconciled, document) = synthesize(7);
    let divisions = reconciled.table(STRUCTMAP).unwrap();
    let struct_ids = divisions.key_set(STRUCT_ID);

    let xml = to_xml_string(&document.root).expect("serialize");
    let outline = PackageOutline::from_document(&parse_document(&xml).expect("parse")).unwrap();
    assert_eq!(outline.divisions.len(), divisions.len());

    for row in &divisions.rows {
        let id = key_of(row, STRUCT_ID).unwrap();
        let division = outline
            .divisions
            .iter()
            .find(|div| div.id.as_deref() == Some(id.as_str()))
            .unwrap();
        match key_of(row, PARENT_ID) {
            Some(parent) if struct_ids.contains(&parent) && parent != id => {
                // Still nested unless a cycle was broken at this node.
                if division.parent.is_none() {
                    assert!(document.report.cycles_broken > 0);
                }
            }
            _ => assert!(division.parent.is_none(), "{id} should be a root"),
        }
    }
}

#[test]
fn synthesized_document_passes_bundled_schemas() {
    let validator = schema_validator();
    let (_, _, document) = synthesize(42);
    let xml = to_xml_string(&document.root).expect("serialize");

    let first = validator.validate_str(&xml);
    assert!(first.valid, "violations: {:?}", first.violations);
    assert_eq!(first, validator.validate_str(&xml));
}

#[test]
fn unknown_descriptive_field_is_reported_once() {
    let validator = schema_validator();
    let (_, _, mut document) = synthesize(42);

    let record = document
        .root
        .children
        .iter_mut()
        .find(|child| child.name == "mets:dmdSec")
        .and_then(|sec| sec.children.first_mut())
        .and_then(|wrap| wrap.children.first_mut())
        .and_then(|data| data.children.first_mut())
        .expect("dc record");
    record.push(metsynth_mets::Element::new("dc:shelfmark").with_text("A/1"));

    let outcome = validator.validate(&document.root);
    assert!(!outcome.valid);
    assert_eq!(outcome.violations.len(), 1);
    assert!(outcome.violations[0].contains("dc schema"));
}
