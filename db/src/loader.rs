use std::collections::HashMap;

use diesel::prelude::*;

use crate::models::{ColumnNode, SectionNode, Segment};
use crate::store;
use crate::DbError;

/// Loads the full structure of a passage: columns, each with its sections,
/// each with its segments, every level in reading order.
///
/// Returns an empty vector for a passage without columns.
pub fn load_structure(
    conn: &mut SqliteConnection,
    passage_id: &str,
) -> Result<Vec<ColumnNode>, DbError> {
    let columns = store::columns_for_passage(conn, passage_id)?;
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let column_ids: Vec<String> = columns.iter().map(|c| c.id.clone()).collect();
    let sections = store::sections_for_columns(conn, &column_ids)?;
    let section_ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();
    let segments = store::segments_for_sections(conn, &section_ids)?;

    // Both lists arrive sorted, and grouping keeps relative order.
    let mut segments_by_section: HashMap<String, Vec<Segment>> = HashMap::new();
    for segment in segments {
        segments_by_section
            .entry(segment.passage_section_id.clone())
            .or_default()
            .push(segment);
    }

    let mut sections_by_column: HashMap<String, Vec<SectionNode>> = HashMap::new();
    for section in sections {
        let segments = segments_by_section.remove(&section.id).unwrap_or_default();
        sections_by_column
            .entry(section.passage_column_id.clone())
            .or_default()
            .push(SectionNode { section, segments });
    }

    Ok(columns
        .into_iter()
        .map(|column| {
            let sections = sections_by_column.remove(&column.id).unwrap_or_default();
            ColumnNode { column, sections }
        })
        .collect())
}
