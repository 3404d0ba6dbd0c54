use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use metsynth_core::{
    DMD_ID, DMDSEC, Dataset, FILE, FILE_ID, PARENT_ID, Row, STRUCT_ID, STRUCTMAP, Table, key_of,
};

use crate::document::Element;
use crate::errors::ReassemblyError;
use crate::namespaces::{
    DC_FIELD_PREFIX, DC_PREFIX, DEFAULT_AGENT_NAME, DEFAULT_CHECKSUM_TYPE, DEFAULT_LOCTYPE,
    DEFAULT_MIMETYPE, DNX_PREFIX, XLINK_PREFIX, declarations, mets, qualified,
};

/// Options for building a package document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassembleOptions {
    /// Name written to the header's creator agent.
    pub agent_name: String,
}

impl Default for ReassembleOptions {
    fn default() -> Self {
        Self {
            agent_name: DEFAULT_AGENT_NAME.to_string(),
        }
    }
}

/// Counts gathered while building one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyReport {
    pub descriptive_records: u64,
    pub files: u64,
    pub divisions: u64,
    pub roots: u64,
    pub orphans_promoted: u64,
    pub cycles_broken: u64,
    pub file_pointers: u64,
    pub pointers_remapped: u64,
    pub pointers_unmapped: u64,
}

/// An assembled document and the counts behind it.
#[derive(Debug, Clone)]
pub struct ReassembledDocument {
    pub root: Element,
    pub report: ReassemblyReport,
}

/// Builds the hierarchical package document from reconciled tables.
#[derive(Debug, Clone, Default)]
pub struct Reassembler {
    options: ReassembleOptions,
}

impl Reassembler {
    pub fn new(options: ReassembleOptions) -> Self {
        Self { options }
    }

    /// Build the document from `dataset`.
    ///
    /// `source_files` is the file table the generator was fitted on; when given,
    /// source file identifiers still referenced by structure rows are mapped to
    /// synthesized ones by position.
    pub fn reassemble(
        &self,
        dataset: &Dataset,
        source_files: Option<&Table>,
    ) -> Result<ReassembledDocument, ReassemblyError> {
        let descriptive = required_table(dataset, DMDSEC)?;
        let files = required_table(dataset, FILE)?;
        let divisions = required_table(dataset, STRUCTMAP)?;

        let file_map = FileIdMap::build(files, source_files);
        let mut report = ReassemblyReport::default();

        let mut root = Element::new(mets("mets"));
        for (key, namespace) in declarations() {
            root.set_attr(key, namespace);
        }

        root.push(self.header());
        for row in &descriptive.rows {
            if let Some(section) = descriptive_section(row, &descriptive.columns) {
                root.push(section);
                report.descriptive_records += 1;
            }
        }
        root.push(administrative_section());
        root.push(file_section(files, &mut report));
        root.push(structure_section(divisions, &file_map, &mut report));

        info!(
            descriptive_records = report.descriptive_records,
            files = report.files,
            divisions = report.divisions,
            roots = report.roots,
            orphans_promoted = report.orphans_promoted,
            cycles_broken = report.cycles_broken,
            "reassembled package document"
        );

        Ok(ReassembledDocument { root, report })
    }

    fn header(&self) -> Element {
        Element::new(mets("metsHdr")).with_child(
            Element::new(mets("agent"))
                .with_attr("ROLE", "CREATOR")
                .with_attr("TYPE", "OTHER")
                .with_child(Element::new(mets("name")).with_text(self.options.agent_name.clone())),
        )
    }
}

fn required_table<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Table, ReassemblyError> {
    dataset
        .table(name)
        .ok_or_else(|| ReassemblyError::MissingTable(name.to_string()))
}

fn descriptive_section(row: &Row, columns: &[String]) -> Option<Element> {
    let Some(dmd_id) = xml_value(row, DMD_ID) else {
        warn!("descriptive record without dmd_id skipped");
        return None;
    };

    let mut record = Element::new(qualified(DC_PREFIX, "dc"));
    for column in columns {
        if column == DMD_ID {
            continue;
        }
        let Some(field) = column.strip_prefix(DC_FIELD_PREFIX) else {
            continue;
        };
        let Some(value) = xml_value(row, column) else {
            continue;
        };
        if !is_xml_name(field) {
            warn!(dmd_id = %dmd_id, column = %column, "descriptive field name is not a valid element name");
            continue;
        }
        record.push(Element::new(qualified(DC_PREFIX, field)).with_text(value));
    }

    Some(
        Element::new(mets("dmdSec")).with_attr("ID", dmd_id).with_child(
            Element::new(mets("mdWrap"))
                .with_attr("MDTYPE", "DC")
                .with_child(Element::new(mets("xmlData")).with_child(record)),
        ),
    )
}

fn administrative_section() -> Element {
    let key = Element::new(qualified(DNX_PREFIX, "key"))
        .with_attr("id", "preservationType")
        .with_text("PRESERVATION_MASTER");
    let section = Element::new(qualified(DNX_PREFIX, "section"))
        .with_attr("id", "generalRepCharacteristics")
        .with_child(Element::new(qualified(DNX_PREFIX, "record")).with_child(key));

    Element::new(mets("amdSec")).with_child(
        Element::new(mets("techMD")).with_attr("ID", "AMD1").with_child(
            Element::new(mets("mdWrap"))
                .with_attr("MDTYPE", "OTHER")
                .with_attr("OTHERMDTYPE", "DNX")
                .with_child(
                    Element::new(mets("xmlData"))
                        .with_child(Element::new(qualified(DNX_PREFIX, "dnx")).with_child(section)),
                ),
        ),
    )
}

fn file_section(files: &Table, report: &mut ReassemblyReport) -> Element {
    let mut group = Element::new(mets("fileGrp")).with_attr("USE", "CONTENT");

    for row in &files.rows {
        let Some(file_id) = xml_value(row, FILE_ID) else {
            warn!("file entry without file_id skipped");
            continue;
        };

        let mut entry = Element::new(mets("file"))
            .with_attr("ID", file_id.clone())
            .with_attr(
                "MIMETYPE",
                xml_value(row, "mimetype").unwrap_or_else(|| DEFAULT_MIMETYPE.to_string()),
            );
        if let Some(dmd_id) = xml_value(row, DMD_ID) {
            entry.set_attr("DMDID", dmd_id);
        }
        if let Some(size) = xml_value(row, "size") {
            entry.set_attr("SIZE", size);
        }
        if let Some(checksum) = xml_value(row, "checksum") {
            entry.set_attr("CHECKSUM", checksum);
            entry.set_attr(
                "CHECKSUMTYPE",
                xml_value(row, "checksumtype").unwrap_or_else(|| DEFAULT_CHECKSUM_TYPE.to_string()),
            );
        }

        let href = xml_value(row, "href").unwrap_or_else(|| format!("file://{file_id}"));
        let loctype = xml_value(row, "loctype").unwrap_or_else(|| DEFAULT_LOCTYPE.to_string());
        entry.push(
            Element::new(mets("FLocat"))
                .with_attr(qualified(XLINK_PREFIX, "href"), href)
                .with_attr("LOCTYPE", loctype),
        );

        group.push(entry);
        report.files += 1;
    }

    Element::new(mets("fileSec")).with_child(group)
}

fn structure_section(
    divisions: &Table,
    file_map: &FileIdMap,
    report: &mut ReassemblyReport,
) -> Element {
    let forest = build_forest(&divisions.rows);
    report.divisions = divisions.rows.len() as u64;
    report.roots = forest.roots.len() as u64;
    report.orphans_promoted = forest.orphans;
    report.cycles_broken = forest.cycles_broken;

    let mut built: Vec<Option<Element>> = divisions
        .rows
        .iter()
        .map(|row| Some(division_element(row, file_map, report)))
        .collect();

    // Descendants follow their ancestors in pre-order, so walking it backwards
    // finishes every child before its parent takes it.
    for &index in forest.preorder().iter().rev() {
        let children: Vec<Element> = forest.children[index]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(div) = built[index].as_mut() {
            div.children.extend(children);
        }
    }

    let mut section = Element::new(mets("structMap")).with_attr("TYPE", "LOGICAL");
    for &root in &forest.roots {
        if let Some(div) = built[root].take() {
            section.push(div);
        }
    }
    section
}

/// One division with its attributes and file pointer, without nested divisions.
fn division_element(row: &Row, file_map: &FileIdMap, report: &mut ReassemblyReport) -> Element {
    let mut div = Element::new(mets("div"));
    if let Some(id) = xml_value(row, STRUCT_ID) {
        div.set_attr("ID", id);
    }
    if let Some(dmd_id) = xml_value(row, DMD_ID) {
        div.set_attr("DMDID", dmd_id);
    }
    for (column, attribute) in [("label", "LABEL"), ("order", "ORDER"), ("type", "TYPE")] {
        if let Some(value) = xml_value(row, column) {
            div.set_attr(attribute, value);
        }
    }

    if let Some(file_id) = key_of(row, FILE_ID) {
        report.file_pointers += 1;
        let resolved = match file_map.resolve(&file_id) {
            Some(target) => {
                if target != file_id {
                    report.pointers_remapped += 1;
                }
                target.to_string()
            }
            None => {
                report.pointers_unmapped += 1;
                debug!(file_id = %file_id, "file pointer left unmapped");
                file_id
            }
        };
        if let Some(resolved) = xml_safe(resolved, FILE_ID) {
            div.push(Element::new(mets("fptr")).with_attr("FILEID", resolved));
        }
    }
    div
}

/// Maps file identifiers referenced by structure rows to synthesized file ids.
///
/// Synthesized ids map to themselves. Source ids map by position: the i-th
/// distinct source id goes to the i-th distinct synthesized id.
#[derive(Debug, Clone, Default)]
pub struct FileIdMap {
    mapping: HashMap<String, String>,
}

impl FileIdMap {
    pub fn build(synthesized: &Table, source: Option<&Table>) -> Self {
        let synthesized_ids = distinct_keys(synthesized, FILE_ID);
        let mut mapping: HashMap<String, String> = synthesized_ids
            .iter()
            .map(|id| (id.clone(), id.clone()))
            .collect();

        if let Some(source) = source {
            for (source_id, target) in distinct_keys(source, FILE_ID)
                .into_iter()
                .zip(synthesized_ids.iter())
            {
                mapping.entry(source_id).or_insert_with(|| target.clone());
            }
        }

        Self { mapping }
    }

    pub fn resolve(&self, file_id: &str) -> Option<&str> {
        self.mapping.get(file_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

fn distinct_keys(table: &Table, column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .filter_map(|row| key_of(row, column))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Parent/child layout of structure rows, by row index.
#[derive(Debug, Default)]
struct Forest {
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
    orphans: u64,
    cycles_broken: u64,
}

impl Forest {
    /// Row indices with every division ahead of its descendants.
    fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.children.len());
        let mut pending: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(index) = pending.pop() {
            order.push(index);
            pending.extend(self.children[index].iter().rev().copied());
        }
        order
    }
}

fn build_forest(rows: &[Row]) -> Forest {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(id) = key_of(row, STRUCT_ID) {
            index.entry(id).or_insert(position);
        }
    }

    let mut orphans = 0;
    let mut parents: Vec<Option<usize>> = rows
        .iter()
        .map(|row| {
            let parent_id = key_of(row, PARENT_ID)?;
            let parent = index.get(&parent_id).copied();
            if parent.is_none() {
                orphans += 1;
                debug!(
                    struct_id = %key_of(row, STRUCT_ID).unwrap_or_default(),
                    parent_id = %parent_id,
                    "unresolved parent, promoting division to root"
                );
            }
            parent
        })
        .collect();

    let cycles_broken = break_cycles(&mut parents);

    let mut forest = Forest {
        roots: Vec::new(),
        children: vec![Vec::new(); rows.len()],
        orphans,
        cycles_broken,
    };
    for (position, parent) in parents.into_iter().enumerate() {
        match parent {
            Some(parent) => forest.children[parent].push(position),
            None => forest.roots.push(position),
        }
    }
    forest
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unseen,
    OnPath,
    Done,
}

/// Cut every parent cycle at its first member in row order, making it a root.
///
/// Each row is visited once: walks stop at rows already settled, and a walk
/// that meets its own path has found a cycle.
fn break_cycles(parents: &mut [Option<usize>]) -> u64 {
    let mut marks = vec![Mark::Unseen; parents.len()];
    let mut path = Vec::new();
    let mut broken = 0;

    for start in 0..parents.len() {
        let mut current = Some(start);
        while let Some(node) = current {
            match marks[node] {
                Mark::Done => break,
                Mark::OnPath => {
                    let entry = path.iter().position(|&member| member == node).unwrap_or(0);
                    if let Some(&first) = path[entry..].iter().min() {
                        warn!(row = first, "parent cycle broken, promoting division to root");
                        parents[first] = None;
                        broken += 1;
                    }
                    break;
                }
                Mark::Unseen => {
                    marks[node] = Mark::OnPath;
                    path.push(node);
                    current = parents[node];
                }
            }
        }
        for node in path.drain(..) {
            marks[node] = Mark::Done;
        }
    }
    broken
}

/// Key form of a cell, cleaned for use as XML text or attribute value.
fn xml_value(row: &Row, column: &str) -> Option<String> {
    key_of(row, column).and_then(|value| xml_safe(value, column))
}

/// Drop characters XML 1.0 cannot carry. Nothing is left of a value that was only those.
fn xml_safe(value: String, column: &str) -> Option<String> {
    if value.chars().all(is_xml_char) {
        return Some(value);
    }
    let cleaned: String = value.chars().filter(|&ch| is_xml_char(ch)).collect();
    warn!(
        column = %column,
        removed = value.chars().count() - cleaned.chars().count(),
        "characters not allowed in XML removed from value"
    );
    (!cleaned.trim().is_empty()).then_some(cleaned)
}

fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse_document, to_xml_string};
    use crate::outline::PackageOutline;
    use metsynth_core::Value;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    fn division(id: &str, parent: Value) -> Row {
        row(&[(STRUCT_ID, text(id)), (DMD_ID, text("D1")), (PARENT_ID, parent)])
    }

    fn package(files: Vec<Row>, divisions: Vec<Row>) -> Dataset {
        Dataset::from_tables(vec![
            Table::from_rows(DMDSEC, vec![row(&[(DMD_ID, text("D1"))])]),
            Table::from_rows(FILE, files),
            Table::from_rows(STRUCTMAP, divisions),
        ])
    }

    fn structure(root: &Element) -> &Element {
        root.child(&mets("structMap")).expect("structMap")
    }

    fn div_ids(parent: &Element) -> Vec<&str> {
        parent
            .children_named(&mets("div"))
            .filter_map(|div| div.attr("ID"))
            .collect()
    }

    fn assemble(data: &Dataset) -> ReassembledDocument {
        Reassembler::default()
            .reassemble(data, None)
            .expect("reassemble")
    }

    #[test]
    fn single_division_points_at_its_file() {
        let data = package(
            vec![row(&[(FILE_ID, text("F1")), (DMD_ID, text("D1"))])],
            vec![row(&[
                (STRUCT_ID, text("S1")),
                (DMD_ID, text("D1")),
                (PARENT_ID, Value::Null),
                (FILE_ID, text("F1")),
            ])],
        );

        let doc = assemble(&data);
        let roots: Vec<&Element> = structure(&doc.root).children_named(&mets("div")).collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].attr("ID"), Some("S1"));
        assert_eq!(roots[0].attr("DMDID"), Some("D1"));
        let fptr = roots[0].child(&mets("fptr")).expect("fptr");
        assert_eq!(fptr.attr("FILEID"), Some("F1"));

        let group = doc
            .root
            .child(&mets("fileSec"))
            .and_then(|sec| sec.child(&mets("fileGrp")))
            .expect("fileGrp");
        let ids: Vec<&str> = group
            .children_named(&mets("file"))
            .filter_map(|file| file.attr("ID"))
            .collect();
        assert_eq!(ids, vec!["F1"]);
    }

    #[test]
    fn child_nests_under_parent() {
        let data = package(
            vec![],
            vec![division("S1", Value::Null), division("S2", text("S1"))],
        );

        let doc = assemble(&data);
        let section = structure(&doc.root);
        assert_eq!(div_ids(section), vec!["S1"]);
        let s1 = section.child(&mets("div")).unwrap();
        assert_eq!(div_ids(s1), vec!["S2"]);
        assert_eq!(doc.report.roots, 1);
    }

    #[test]
    fn unresolved_parent_is_promoted() {
        let data = package(
            vec![],
            vec![
                division("S1", Value::Null),
                division("S2", text("S_missing")),
                division("S3", text("")),
            ],
        );

        let doc = assemble(&data);
        assert_eq!(div_ids(structure(&doc.root)), vec!["S1", "S2", "S3"]);
        assert_eq!(doc.report.orphans_promoted, 1);
    }

    #[test]
    fn cycles_are_broken_at_first_member() {
        let data = package(
            vec![],
            vec![
                division("S0", text("S1")),
                division("S1", text("S2")),
                division("S2", text("S1")),
                division("S3", text("S3")),
            ],
        );

        let doc = assemble(&data);
        let section = structure(&doc.root);
        assert_eq!(div_ids(section), vec!["S1", "S3"]);
        let s1 = section.child(&mets("div")).unwrap();
        assert_eq!(div_ids(s1), vec!["S0", "S2"]);
        assert_eq!(doc.report.cycles_broken, 2);
        assert_eq!(doc.report.divisions, 4);
    }

    #[test]
    fn long_parent_chain_nests_fully() {
        let depth = 10_000;
        let divisions: Vec<Row> = (0..depth)
            .map(|level| {
                let parent = match level {
                    0 => Value::Null,
                    _ => text(&format!("S{}", level - 1)),
                };
                division(&format!("S{level}"), parent)
            })
            .collect();

        let doc = assemble(&package(vec![], divisions));
        assert_eq!(doc.report.roots, 1);
        assert_eq!(doc.report.cycles_broken, 0);

        let mut current = structure(&doc.root);
        let mut levels = 0;
        while let Some(div) = current.child(&mets("div")) {
            levels += 1;
            current = div;
        }
        assert_eq!(levels, depth);
        assert_eq!(current.attr("ID"), Some("S9999"));

        let xml = to_xml_string(&doc.root).expect("serialize");
        let parsed = parse_document(&xml).expect("parse");
        let outline = PackageOutline::from_document(&parsed).expect("outline");
        assert_eq!(outline.divisions.len(), depth);
        assert_eq!(outline.edges().len(), depth - 1);
        assert_eq!(outline.roots(), vec!["S0"]);
    }

    #[test]
    fn long_cycle_is_broken_once() {
        let size = 10_000;
        let divisions: Vec<Row> = (0..size)
            .map(|index| division(&format!("S{index}"), text(&format!("S{}", (index + 1) % size))))
            .collect();

        let doc = assemble(&package(vec![], divisions));
        assert_eq!(doc.report.cycles_broken, 1);
        assert_eq!(div_ids(structure(&doc.root)), vec!["S0"]);
    }

    #[test]
    fn characters_forbidden_in_xml_are_removed() {
        let dmd = Table::from_rows(
            DMDSEC,
            vec![row(&[
                (DMD_ID, text("D1")),
                ("dc_title", text("Min\u{1}utes")),
                ("dc_subject", text("\u{0}\u{8}")),
            ])],
        );
        let data = Dataset::from_tables(vec![
            dmd,
            Table::from_rows(FILE, vec![]),
            Table::from_rows(STRUCTMAP, vec![]),
        ]);

        let doc = assemble(&data);
        let xml = to_xml_string(&doc.root).expect("serialize");
        let parsed = parse_document(&xml).expect("parse");
        let record = parsed
            .child(&mets("dmdSec"))
            .and_then(|sec| sec.child(&mets("mdWrap")))
            .and_then(|wrap| wrap.child(&mets("xmlData")))
            .and_then(|data| data.child("dc:dc"))
            .expect("dc record");
        let names: Vec<&str> = record.children.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, vec!["dc:title"]);
        assert_eq!(record.children[0].text.as_deref(), Some("Minutes"));
    }

    #[test]
    fn duplicate_ids_are_kept_and_resolve_to_first() {
        let data = package(
            vec![],
            vec![
                division("S1", Value::Null),
                division("S1", Value::Null),
                division("S2", text("S1")),
            ],
        );

        let doc = assemble(&data);
        let section = structure(&doc.root);
        assert_eq!(div_ids(section), vec!["S1", "S1"]);
        let first = section.child(&mets("div")).unwrap();
        assert_eq!(div_ids(first), vec!["S2"]);
    }

    #[test]
    fn file_defaults_fill_missing_fields() {
        let data = package(
            vec![
                row(&[(FILE_ID, text("F1")), (DMD_ID, text("D1"))]),
                row(&[
                    (FILE_ID, text("F2")),
                    (DMD_ID, text("D1")),
                    ("checksum", text("abc")),
                    ("size", Value::Int(12)),
                    ("mimetype", text("image/tiff")),
                ]),
            ],
            vec![division("S1", Value::Null)],
        );

        let doc = assemble(&data);
        let group = doc
            .root
            .child(&mets("fileSec"))
            .and_then(|sec| sec.child(&mets("fileGrp")))
            .unwrap();
        let files: Vec<&Element> = group.children_named(&mets("file")).collect();

        assert_eq!(files[0].attr("MIMETYPE"), Some(DEFAULT_MIMETYPE));
        assert_eq!(files[0].attr("CHECKSUMTYPE"), None);
        assert_eq!(files[0].attr("SIZE"), None);
        let location = files[0].child(&mets("FLocat")).unwrap();
        assert_eq!(location.attr("xlink:href"), Some("file://F1"));
        assert_eq!(location.attr("LOCTYPE"), Some("URL"));

        assert_eq!(files[1].attr("MIMETYPE"), Some("image/tiff"));
        assert_eq!(files[1].attr("SIZE"), Some("12"));
        assert_eq!(files[1].attr("CHECKSUMTYPE"), Some("MD5"));
    }

    #[test]
    fn descriptive_fields_strip_prefix_and_skip_absent_values() {
        let dmd = Table::from_rows(
            DMDSEC,
            vec![row(&[
                (DMD_ID, text("D1")),
                ("dc_title", text("Minutes")),
                ("dc_date", Value::Null),
                ("dc_subject", text("  ")),
                ("note", text("internal")),
                ("dc_bad name", text("x")),
            ])],
        );
        let data = Dataset::from_tables(vec![
            dmd,
            Table::from_rows(FILE, vec![]),
            Table::from_rows(STRUCTMAP, vec![]),
        ]);

        let doc = assemble(&data);
        let record = doc
            .root
            .child(&mets("dmdSec"))
            .and_then(|sec| sec.child(&mets("mdWrap")))
            .and_then(|wrap| wrap.child(&mets("xmlData")))
            .and_then(|data| data.child("dc:dc"))
            .expect("dc record");
        let names: Vec<&str> = record.children.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, vec!["dc:title"]);
        assert_eq!(record.children[0].text.as_deref(), Some("Minutes"));
    }

    #[test]
    fn sections_follow_fixed_order() {
        let doc = assemble(&package(vec![], vec![division("S1", Value::Null)]));
        let names: Vec<&str> = doc.root.children.iter().map(|c| c.local_name()).collect();
        assert_eq!(names, vec!["metsHdr", "dmdSec", "amdSec", "fileSec", "structMap"]);
        assert_eq!(doc.root.attr("xmlns:mets"), Some("http://www.loc.gov/METS/"));
    }

    #[test]
    fn missing_table_is_fatal() {
        let data = Dataset::from_tables(vec![Table::from_rows(DMDSEC, vec![])]);
        let err = Reassembler::default().reassemble(&data, None).unwrap_err();
        assert!(matches!(err, ReassemblyError::MissingTable(name) if name == FILE));
    }

    #[test]
    fn source_file_ids_map_by_position() {
        let synthesized = Table::from_rows(
            FILE,
            vec![
                row(&[(FILE_ID, text("file_00001"))]),
                row(&[(FILE_ID, text("file_00002"))]),
            ],
        );
        let source = Table::from_rows(
            FILE,
            vec![
                row(&[(FILE_ID, text("FILE1"))]),
                row(&[(FILE_ID, text("FILE2"))]),
                row(&[(FILE_ID, text("FILE3"))]),
            ],
        );

        let map = FileIdMap::build(&synthesized, Some(&source));
        assert_eq!(map.resolve("file_00002"), Some("file_00002"));
        assert_eq!(map.resolve("FILE1"), Some("file_00001"));
        assert_eq!(map.resolve("FILE2"), Some("file_00002"));
        assert_eq!(map.resolve("FILE3"), None);
        assert_eq!(map.len(), 4);
    }
}
