use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::errors::DocumentError;
use crate::namespaces::mets;

/// One structure division as recovered from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionOutline {
    pub id: Option<String>,
    pub parent: Option<String>,
    pub dmd_id: Option<String>,
    pub label: Option<String>,
    pub order: Option<String>,
    pub div_type: Option<String>,
    pub file_ids: Vec<String>,
}

/// Identifiers and hierarchy of a package document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOutline {
    pub dmd_ids: Vec<String>,
    pub file_ids: Vec<String>,
    pub divisions: Vec<DivisionOutline>,
}

impl PackageOutline {
    pub fn from_document(root: &Element) -> Result<Self, DocumentError> {
        if root.name != mets("mets") {
            return Err(DocumentError::Malformed(format!(
                "expected <{}> root, found <{}>",
                mets("mets"),
                root.name
            )));
        }

        let mut outline = PackageOutline {
            dmd_ids: root
                .children_named(&mets("dmdSec"))
                .filter_map(|sec| sec.attr("ID").map(str::to_string))
                .collect(),
            ..PackageOutline::default()
        };

        let file_name = mets("file");
        for group in root
            .children_named(&mets("fileSec"))
            .flat_map(|sec| sec.children.iter())
        {
            outline.file_ids.extend(
                group
                    .children_named(&file_name)
                    .filter_map(|file| file.attr("ID").map(str::to_string)),
            );
        }

        for section in root.children_named(&mets("structMap")) {
            for div in section.children_named(&mets("div")) {
                collect_divisions(div, &mut outline.divisions);
            }
        }

        Ok(outline)
    }

    pub fn struct_ids(&self) -> BTreeSet<String> {
        self.divisions.iter().filter_map(|div| div.id.clone()).collect()
    }

    /// `(parent, child)` pairs of the structure hierarchy.
    pub fn edges(&self) -> BTreeSet<(String, String)> {
        self.divisions
            .iter()
            .filter_map(|div| Some((div.parent.clone()?, div.id.clone()?)))
            .collect()
    }

    pub fn roots(&self) -> Vec<&str> {
        self.divisions
            .iter()
            .filter(|div| div.parent.is_none())
            .filter_map(|div| div.id.as_deref())
            .collect()
    }
}

fn collect_divisions(top: &Element, out: &mut Vec<DivisionOutline>) {
    let div_name = mets("div");
    let mut pending: Vec<(&Element, Option<String>)> = vec![(top, None)];

    while let Some((div, parent)) = pending.pop() {
        let id = div.attr("ID").map(str::to_string);
        out.push(DivisionOutline {
            id: id.clone(),
            parent,
            dmd_id: div.attr("DMDID").map(str::to_string),
            label: div.attr("LABEL").map(str::to_string),
            order: div.attr("ORDER").map(str::to_string),
            div_type: div.attr("TYPE").map(str::to_string),
            file_ids: div
                .children_named(&mets("fptr"))
                .filter_map(|fptr| fptr.attr("FILEID").map(str::to_string))
                .collect(),
        });

        let children: Vec<&Element> = div.children_named(&div_name).collect();
        pending.extend(children.into_iter().rev().map(|child| (child, id.clone())));
    }
}
