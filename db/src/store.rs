//! Row-level access to the structure tables.
//!
//! None of these functions open a transaction; callers that combine several
//! of them run them inside one.

use std::cmp::Ordering;

use diesel::prelude::*;
use log::debug;
use uuid::Uuid;

use crate::models::{
    current_timestamp, Anchored, Color, Column, HeadingType, NewColumn, NewSection, NewSegment,
    Section, Segment, WordId,
};
use crate::schema::{passage_columns, passage_sections, passage_segments, passages, studies};
use crate::DbError;

/// Sorts entities sharing a parent by their starting word.
pub fn sort_by_word<T: Anchored>(items: &mut [T]) {
    items.sort_by(|a, b| a.starting_word_id().compare_position(b.starting_word_id()));
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn create_column(
    conn: &mut SqliteConnection,
    passage_id: &str,
    word: &WordId,
) -> Result<Column, DbError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(passage_columns::table)
        .values(&NewColumn {
            id: &id,
            passage_id,
            starting_word_id: word,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    Ok(Column {
        id,
        passage_id: passage_id.to_string(),
        starting_word_id: word.clone(),
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn create_section(
    conn: &mut SqliteConnection,
    column_id: &str,
    word: &WordId,
    color: Color,
) -> Result<Section, DbError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(passage_sections::table)
        .values(&NewSection {
            id: &id,
            passage_column_id: column_id,
            starting_word_id: word,
            color,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    Ok(Section {
        id,
        passage_column_id: column_id.to_string(),
        starting_word_id: word.clone(),
        color,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn create_segment(
    conn: &mut SqliteConnection,
    section_id: &str,
    word: &WordId,
) -> Result<Segment, DbError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(passage_segments::table)
        .values(&NewSegment {
            id: &id,
            passage_section_id: section_id,
            starting_word_id: word,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    Ok(Segment {
        id,
        passage_section_id: section_id.to_string(),
        starting_word_id: word.clone(),
        heading_one: None,
        heading_two: None,
        heading_three: None,
        note: None,
        commentary: None,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn find_column(conn: &mut SqliteConnection, id: &str) -> Result<Option<Column>, DbError> {
    passage_columns::table
        .find(id)
        .select(Column::as_select())
        .first(conn)
        .optional()
        .map_err(DbError::from)
}

pub fn find_section(conn: &mut SqliteConnection, id: &str) -> Result<Option<Section>, DbError> {
    passage_sections::table
        .find(id)
        .select(Section::as_select())
        .first(conn)
        .optional()
        .map_err(DbError::from)
}

pub fn find_segment(conn: &mut SqliteConnection, id: &str) -> Result<Option<Segment>, DbError> {
    passage_segments::table
        .find(id)
        .select(Segment::as_select())
        .first(conn)
        .optional()
        .map_err(DbError::from)
}

/// Columns of a passage, in reading order.
pub fn columns_for_passage(
    conn: &mut SqliteConnection,
    passage_id: &str,
) -> Result<Vec<Column>, DbError> {
    let mut columns = passage_columns::table
        .filter(passage_columns::passage_id.eq(passage_id))
        .order_by(passage_columns::starting_word_id.asc())
        .select(Column::as_select())
        .load::<Column>(conn)?;
    sort_by_word(&mut columns);
    Ok(columns)
}

/// Sections of any of the given columns, in reading order.
pub fn sections_for_columns(
    conn: &mut SqliteConnection,
    column_ids: &[String],
) -> Result<Vec<Section>, DbError> {
    let mut sections = passage_sections::table
        .filter(passage_sections::passage_column_id.eq_any(column_ids))
        .order_by(passage_sections::starting_word_id.asc())
        .select(Section::as_select())
        .load::<Section>(conn)?;
    sort_by_word(&mut sections);
    Ok(sections)
}

/// Segments of any of the given sections, in reading order.
pub fn segments_for_sections(
    conn: &mut SqliteConnection,
    section_ids: &[String],
) -> Result<Vec<Segment>, DbError> {
    let mut segments = passage_segments::table
        .filter(passage_segments::passage_section_id.eq_any(section_ids))
        .order_by(passage_segments::starting_word_id.asc())
        .select(Segment::as_select())
        .load::<Segment>(conn)?;
    sort_by_word(&mut segments);
    Ok(segments)
}

pub fn sections_for_column(
    conn: &mut SqliteConnection,
    column_id: &str,
) -> Result<Vec<Section>, DbError> {
    sections_for_columns(conn, &[column_id.to_string()])
}

pub fn segments_for_section(
    conn: &mut SqliteConnection,
    section_id: &str,
) -> Result<Vec<Segment>, DbError> {
    segments_for_sections(conn, &[section_id.to_string()])
}

/// IDs of the entities starting at or after `word`.
fn at_or_after<T: Anchored>(items: Vec<T>, word: &WordId, id: impl Fn(T) -> String) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| item.starting_word_id().compare_position(word) != Ordering::Less)
        .map(id)
        .collect()
}

/// Moves every section of `from_column` starting at or after `word` to
/// `to_column`. Starting words are left untouched.
pub fn transfer_sections(
    conn: &mut SqliteConnection,
    from_column: &str,
    to_column: &str,
    word: &WordId,
) -> Result<usize, DbError> {
    let ids = at_or_after(sections_for_column(conn, from_column)?, word, |s| s.id);
    if ids.is_empty() {
        return Ok(0);
    }

    let moved = diesel::update(passage_sections::table.filter(passage_sections::id.eq_any(&ids)))
        .set((
            passage_sections::passage_column_id.eq(to_column),
            passage_sections::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;
    debug!(
        "Transferred {} section(s) from column {} to {} at {}",
        moved, from_column, to_column, word
    );
    Ok(moved)
}

/// Moves every segment of `from_section` starting at or after `word` to
/// `to_section`. Starting words are left untouched.
pub fn transfer_segments(
    conn: &mut SqliteConnection,
    from_section: &str,
    to_section: &str,
    word: &WordId,
) -> Result<usize, DbError> {
    let ids = at_or_after(segments_for_section(conn, from_section)?, word, |s| s.id);
    if ids.is_empty() {
        return Ok(0);
    }

    let moved = diesel::update(passage_segments::table.filter(passage_segments::id.eq_any(&ids)))
        .set((
            passage_segments::passage_section_id.eq(to_section),
            passage_segments::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;
    debug!(
        "Transferred {} segment(s) from section {} to {} at {}",
        moved, from_section, to_section, word
    );
    Ok(moved)
}

/// Paints every section of a column with the same color.
pub fn recolor_sections(
    conn: &mut SqliteConnection,
    column_id: &str,
    color: Color,
) -> Result<usize, DbError> {
    diesel::update(
        passage_sections::table.filter(passage_sections::passage_column_id.eq(column_id)),
    )
    .set((
        passage_sections::color.eq(color),
        passage_sections::updated_at.eq(current_timestamp()),
    ))
    .execute(conn)
    .map_err(DbError::from)
}

pub fn update_heading(
    conn: &mut SqliteConnection,
    segment_id: &str,
    heading: HeadingType,
    text: Option<&str>,
) -> Result<usize, DbError> {
    use crate::schema::passage_segments::dsl::*;

    let now = current_timestamp();
    let target = passage_segments.find(segment_id);
    match heading {
        HeadingType::One => diesel::update(target)
            .set((heading_one.eq(text), updated_at.eq(&now)))
            .execute(conn),
        HeadingType::Two => diesel::update(target)
            .set((heading_two.eq(text), updated_at.eq(&now)))
            .execute(conn),
        HeadingType::Three => diesel::update(target)
            .set((heading_three.eq(text), updated_at.eq(&now)))
            .execute(conn),
    }
    .map_err(DbError::from)
}

pub fn update_note(
    conn: &mut SqliteConnection,
    segment_id: &str,
    text: Option<&str>,
) -> Result<usize, DbError> {
    diesel::update(passage_segments::table.find(segment_id))
        .set((
            passage_segments::note.eq(text),
            passage_segments::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)
        .map_err(DbError::from)
}

pub fn update_commentary(
    conn: &mut SqliteConnection,
    segment_id: &str,
    text: Option<&str>,
) -> Result<usize, DbError> {
    diesel::update(passage_segments::table.find(segment_id))
        .set((
            passage_segments::commentary.eq(text),
            passage_segments::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)
        .map_err(DbError::from)
}

/// User owning the passage, through its study.
pub fn passage_owner(
    conn: &mut SqliteConnection,
    passage_id: &str,
) -> Result<Option<String>, DbError> {
    passages::table
        .inner_join(studies::table)
        .filter(passages::id.eq(passage_id))
        .select(studies::user_id)
        .first::<String>(conn)
        .optional()
        .map_err(DbError::from)
}

/// User owning the column, through its passage and study.
pub fn column_owner(
    conn: &mut SqliteConnection,
    column_id: &str,
) -> Result<Option<String>, DbError> {
    passage_columns::table
        .inner_join(passages::table.inner_join(studies::table))
        .filter(passage_columns::id.eq(column_id))
        .select(studies::user_id)
        .first::<String>(conn)
        .optional()
        .map_err(DbError::from)
}

/// User owning the segment, walking section, column, passage and study.
pub fn segment_owner(
    conn: &mut SqliteConnection,
    segment_id: &str,
) -> Result<Option<String>, DbError> {
    passage_segments::table
        .inner_join(
            passage_sections::table
                .inner_join(passage_columns::table.inner_join(passages::table.inner_join(studies::table))),
        )
        .filter(passage_segments::id.eq(segment_id))
        .select(studies::user_id)
        .first::<String>(conn)
        .optional()
        .map_err(DbError::from)
}

pub fn column_count(conn: &mut SqliteConnection, passage_id: &str) -> Result<i64, DbError> {
    passage_columns::table
        .filter(passage_columns::passage_id.eq(passage_id))
        .count()
        .get_result(conn)
        .map_err(DbError::from)
}
