//! Finds where a word falls in a loaded passage structure.
//!
//! Columns use a strict lower bound: a word equal to a column's start can
//! never be the site of a new column. Sections and segments use an inclusive
//! lower bound, so the word resolves to the section or segment it starts.

use std::cmp::Ordering;

use crate::models::{Anchored, ColumnNode, SectionNode, Segment, WordId};
use crate::DbError;

/// The column, section and segment containing a word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location<'a> {
    pub column: &'a ColumnNode,
    pub section: &'a SectionNode,
    pub segment: &'a Segment,
}

/// Returns the item whose span `[start, next.start)` holds `word`. Items must
/// be sorted by starting word.
fn containing<'a, T: Anchored>(items: &'a [T], word: &WordId) -> Option<&'a T> {
    items.iter().enumerate().find_map(|(i, item)| {
        let after_start = word.compare_position(item.starting_word_id()) != Ordering::Less;
        let before_next = items
            .get(i + 1)
            .map_or(true, |next| word.compare_position(next.starting_word_id()) == Ordering::Less);
        (after_start && before_next).then_some(item)
    })
}

/// Locates `word` in a structure as produced by
/// [`load_structure`](crate::loader::load_structure).
pub fn locate<'a>(structure: &'a [ColumnNode], word: &WordId) -> Result<Location<'a>, DbError> {
    if structure
        .iter()
        .any(|column| word.compare_position(&column.column.starting_word_id) == Ordering::Equal)
    {
        return Err(DbError::ColumnBoundary);
    }

    let column = containing(structure, word).ok_or(DbError::InvalidInsertionPoint)?;
    locate_in_column(column, word)
}

/// Locates `word` among the sections and segments of one column.
pub fn locate_in_column<'a>(
    column: &'a ColumnNode,
    word: &WordId,
) -> Result<Location<'a>, DbError> {
    let section = containing(&column.sections, word).ok_or(DbError::InvalidInsertionPoint)?;
    let segment = containing(&section.segments, word).ok_or(DbError::InvalidInsertionPoint)?;

    Ok(Location {
        column,
        section,
        segment,
    })
}
