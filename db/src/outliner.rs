use std::cmp::Ordering;

use diesel::prelude::*;
use log::{debug, error, info};

use crate::loader;
use crate::locator::{locate, locate_in_column, Location};
use crate::metadata::BibleMetadata;
use crate::models::{
    validate_note, Color, Column, ColumnNode, HeadingType, Section, SectionNode, Segment, WordId,
};
use crate::store;
use crate::DbError;

/// Trait implemented by types that read and reshape the structure of a
/// passage.
///
/// Every mutation runs in its own `BEGIN IMMEDIATE` transaction, so the reads
/// that decide where a boundary goes and the writes that draw it are never
/// interleaved with another writer.
pub trait PassageStructure {
    /// Loads the columns of a passage with their sections and segments, all
    /// in reading order.
    fn load_structure(
        passage_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<ColumnNode>, DbError>;

    /// Starts a new column at `word`, inside the given column, section and
    /// segment.
    ///
    /// When `word` falls inside the section, a new section of the same color
    /// is started there too (and likewise a new segment when it falls inside
    /// the segment). Every section of the old column starting at or after
    /// `word` then moves to the new column.
    fn insert_column(
        user_id: &str,
        passage_id: &str,
        column_id: &str,
        section_id: &str,
        segment_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Column, DbError>;

    /// Starts a new section at `word` within a column. The new section takes
    /// the color of the one it is split from, and receives every segment of
    /// that section starting at or after `word`.
    fn insert_section(
        user_id: &str,
        passage_id: &str,
        column_id: &str,
        section_id: &str,
        segment_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Section, DbError>;

    /// Starts a new, empty segment at `word` within a section.
    fn insert_segment(
        user_id: &str,
        passage_id: &str,
        section_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Segment, DbError>;

    /// Sets or clears one of the three headings of a segment.
    fn update_segment_heading(
        user_id: &str,
        segment_id: &str,
        heading: HeadingType,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError>;

    /// Sets or clears the note of a segment. Notes are limited to
    /// [NOTE_MAX_CHARS](crate::models::NOTE_MAX_CHARS) characters.
    fn update_segment_note(
        user_id: &str,
        segment_id: &str,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError>;

    /// Sets or clears the commentary of a segment.
    fn update_segment_commentary(
        user_id: &str,
        segment_id: &str,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError>;

    fn get_segment(
        user_id: &str,
        segment_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Segment, DbError>;

    /// Paints every section of a column with `color`, overwriting their
    /// individual colors. Returns the number of sections painted.
    fn set_column_color(
        user_id: &str,
        column_id: &str,
        color: &str,
        conn: &mut SqliteConnection,
    ) -> Result<usize, DbError>;

    /// Gives a passage without structure its initial column, section and
    /// segment, all starting at the first word of `from_chapter:from_verse`.
    fn create_default_passage_structure(
        metadata: &BibleMetadata,
        passage_id: &str,
        testament_id: &str,
        book_id: &str,
        from_chapter: i32,
        from_verse: i32,
        conn: &mut SqliteConnection,
    ) -> Result<ColumnNode, DbError>;
}

/// Main implementation for the [PassageStructure](crate::outliner::PassageStructure) trait.
pub struct Outliner;

impl PassageStructure for Outliner {
    fn load_structure(
        passage_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<ColumnNode>, DbError> {
        loader::load_structure(conn, passage_id)
    }

    fn insert_column(
        user_id: &str,
        passage_id: &str,
        column_id: &str,
        section_id: &str,
        segment_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Column, DbError> {
        conn.immediate_transaction(|conn| {
            authorize_passage(user_id, passage_id, conn)?;
            let (column, section, segment) =
                owned_chain(passage_id, column_id, section_id, segment_id, conn)?;
            check_book(word, &column.starting_word_id)?;

            if word.compare_position(&column.starting_word_id) == Ordering::Equal {
                return Err(DbError::ColumnBoundary);
            }

            let structure = loader::load_structure(conn, passage_id)?;
            let location = locate(&structure, word).map_err(|e| misplaced(word, e))?;
            check_location(&location, column_id, section_id, segment_id, word)?;

            let new_column = store::create_column(conn, passage_id, word)?;
            if word.compare_position(&section.starting_word_id) != Ordering::Equal {
                let new_section =
                    store::create_section(conn, &new_column.id, word, section.color)?;
                if word.compare_position(&segment.starting_word_id) != Ordering::Equal {
                    store::create_segment(conn, &new_section.id, word)?;
                }
                store::transfer_segments(conn, &section.id, &new_section.id, word)?;
            }
            store::transfer_sections(conn, &column.id, &new_column.id, word)?;

            info!(
                "Inserted column {} at {} in passage {}",
                new_column.id, word, passage_id
            );
            Ok(new_column)
        })
    }

    fn insert_section(
        user_id: &str,
        passage_id: &str,
        column_id: &str,
        section_id: &str,
        segment_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Section, DbError> {
        conn.immediate_transaction(|conn| {
            authorize_passage(user_id, passage_id, conn)?;
            let (column, section, segment) =
                owned_chain(passage_id, column_id, section_id, segment_id, conn)?;
            check_book(word, &section.starting_word_id)?;

            if word.compare_position(&section.starting_word_id) == Ordering::Equal {
                return Err(DbError::SectionBoundary);
            }

            let structure = loader::load_structure(conn, passage_id)?;
            let column_node = column_node(&structure, &column.id, word)?;
            let location = locate_in_column(column_node, word).map_err(|e| misplaced(word, e))?;
            check_location(&location, column_id, section_id, segment_id, word)?;

            let new_section = store::create_section(conn, &column.id, word, section.color)?;
            if word.compare_position(&segment.starting_word_id) != Ordering::Equal {
                store::create_segment(conn, &new_section.id, word)?;
            }
            store::transfer_segments(conn, &section.id, &new_section.id, word)?;

            info!(
                "Inserted section {} at {} in column {}",
                new_section.id, word, column.id
            );
            Ok(new_section)
        })
    }

    fn insert_segment(
        user_id: &str,
        passage_id: &str,
        section_id: &str,
        word: &WordId,
        conn: &mut SqliteConnection,
    ) -> Result<Segment, DbError> {
        conn.immediate_transaction(|conn| {
            authorize_passage(user_id, passage_id, conn)?;

            let section = store::find_section(conn, section_id)?
                .ok_or(DbError::NotInPassage { entity: "Section" })?;
            store::find_column(conn, &section.passage_column_id)?
                .filter(|c| c.passage_id == passage_id)
                .ok_or(DbError::NotInPassage { entity: "Section" })?;
            check_book(word, &section.starting_word_id)?;

            if word.compare_position(&section.starting_word_id) == Ordering::Equal {
                return Err(DbError::SegmentAtSectionStart);
            }
            if store::segments_for_section(conn, section_id)?
                .iter()
                .any(|s| word.compare_position(&s.starting_word_id) == Ordering::Equal)
            {
                return Err(DbError::SegmentBoundary);
            }

            let structure = loader::load_structure(conn, passage_id)?;
            let column_node = column_node(&structure, &section.passage_column_id, word)?;
            let location = locate_in_column(column_node, word).map_err(|e| misplaced(word, e))?;
            if location.section.section.id != section_id {
                error!(
                    "Word {} lies in section {}, not in section {}",
                    word, location.section.section.id, section_id
                );
                return Err(DbError::InvalidInsertionPoint);
            }

            let segment = store::create_segment(conn, section_id, word)?;
            info!(
                "Inserted segment {} at {} in section {}",
                segment.id, word, section_id
            );
            Ok(segment)
        })
    }

    fn update_segment_heading(
        user_id: &str,
        segment_id: &str,
        heading: HeadingType,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError> {
        conn.immediate_transaction(|conn| {
            authorize_segment(user_id, segment_id, conn)?;
            store::update_heading(conn, segment_id, heading, text)?;
            debug!("Updated heading {:?} of segment {}", heading, segment_id);
            Ok(())
        })
    }

    fn update_segment_note(
        user_id: &str,
        segment_id: &str,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError> {
        validate_note(text)?;

        conn.immediate_transaction(|conn| {
            authorize_segment(user_id, segment_id, conn)?;
            store::update_note(conn, segment_id, text)?;
            debug!("Updated note of segment {}", segment_id);
            Ok(())
        })
    }

    fn update_segment_commentary(
        user_id: &str,
        segment_id: &str,
        text: Option<&str>,
        conn: &mut SqliteConnection,
    ) -> Result<(), DbError> {
        conn.immediate_transaction(|conn| {
            authorize_segment(user_id, segment_id, conn)?;
            store::update_commentary(conn, segment_id, text)?;
            debug!("Updated commentary of segment {}", segment_id);
            Ok(())
        })
    }

    fn get_segment(
        user_id: &str,
        segment_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Segment, DbError> {
        authorize_segment(user_id, segment_id, conn)?;
        store::find_segment(conn, segment_id)?.ok_or(DbError::SegmentNotFound)
    }

    fn set_column_color(
        user_id: &str,
        column_id: &str,
        color: &str,
        conn: &mut SqliteConnection,
    ) -> Result<usize, DbError> {
        let color: Color = color.parse()?;

        conn.immediate_transaction(|conn| {
            match store::column_owner(conn, column_id)? {
                None => return Err(DbError::ColumnNotFound),
                Some(owner) if owner != user_id => return Err(DbError::Unauthorized),
                Some(_) => {}
            }

            let painted = store::recolor_sections(conn, column_id, color)?;
            info!(
                "Painted {} section(s) of column {} {}",
                painted, column_id, color
            );
            Ok(painted)
        })
    }

    fn create_default_passage_structure(
        metadata: &BibleMetadata,
        passage_id: &str,
        testament_id: &str,
        book_id: &str,
        from_chapter: i32,
        from_verse: i32,
        conn: &mut SqliteConnection,
    ) -> Result<ColumnNode, DbError> {
        let abbreviation = match metadata.book_abbreviation(testament_id, book_id) {
            Some(code) => code.to_string(),
            None => {
                let fallback: String = book_id
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .to_uppercase();
                debug!(
                    "No abbreviation for book '{}' in {}, using '{}'",
                    book_id, testament_id, fallback
                );
                fallback
            }
        };
        let word = first_word(&abbreviation, from_chapter, from_verse)?;

        conn.transaction(|conn| {
            if store::column_count(conn, passage_id)? > 0 {
                return Err(DbError::StructureExists {
                    passage: passage_id.to_string(),
                });
            }

            let column = store::create_column(conn, passage_id, &word)?;
            let section = store::create_section(conn, &column.id, &word, Color::Blue)?;
            let segment = store::create_segment(conn, &section.id, &word)?;

            info!("Created default structure at {} for passage {}", word, passage_id);
            Ok(ColumnNode {
                column,
                sections: vec![SectionNode {
                    section,
                    segments: vec![segment],
                }],
            })
        })
    }
}

fn first_word(abbreviation: &str, chapter: i32, verse: i32) -> Result<WordId, DbError> {
    match (u16::try_from(chapter), u16::try_from(verse)) {
        (Ok(chapter), Ok(verse)) => WordId::first_of_verse(abbreviation, chapter, verse),
        _ => Err(DbError::InvalidWordId {
            word_id: format!("{}-{}-{}-1", abbreviation, chapter, verse),
        }),
    }
}

/// Every word ID of a passage carries the same book.
fn check_book(word: &WordId, anchor: &WordId) -> Result<(), DbError> {
    if word.book() != anchor.book() {
        error!("Word {} is not in the book of {}", word, anchor);
        return Err(DbError::InvalidInsertionPoint);
    }
    Ok(())
}

fn authorize_passage(
    user_id: &str,
    passage_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), DbError> {
    match store::passage_owner(conn, passage_id)? {
        None => Err(DbError::PassageNotFound {
            passage: passage_id.to_string(),
        }),
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(DbError::Unauthorized),
    }
}

fn authorize_segment(
    user_id: &str,
    segment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), DbError> {
    match store::segment_owner(conn, segment_id)? {
        None => Err(DbError::SegmentNotFound),
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(DbError::SegmentUnauthorized),
    }
}

/// Loads a column, section and segment, checking each belongs to the one
/// before it and the column to the passage.
fn owned_chain(
    passage_id: &str,
    column_id: &str,
    section_id: &str,
    segment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(Column, Section, Segment), DbError> {
    let column = store::find_column(conn, column_id)?
        .filter(|c| c.passage_id == passage_id)
        .ok_or(DbError::NotInPassage { entity: "Column" })?;
    let section = store::find_section(conn, section_id)?
        .filter(|s| s.passage_column_id == column.id)
        .ok_or(DbError::NotInPassage { entity: "Section" })?;
    let segment = store::find_segment(conn, segment_id)?
        .filter(|s| s.passage_section_id == section.id)
        .ok_or(DbError::NotInPassage { entity: "Segment" })?;

    Ok((column, section, segment))
}

fn column_node<'a>(
    structure: &'a [ColumnNode],
    column_id: &str,
    word: &WordId,
) -> Result<&'a ColumnNode, DbError> {
    structure
        .iter()
        .find(|c| c.column.id == column_id)
        .ok_or_else(|| misplaced(word, DbError::InvalidInsertionPoint))
}

/// Logs a word the locator could not place. Only a boundary rejection is
/// an expected outcome.
fn misplaced(word: &WordId, e: DbError) -> DbError {
    if e != DbError::ColumnBoundary {
        error!("Could not place {} in the passage structure: {}", word, e);
    }
    e
}

/// The caller's column, section and segment must be where the word lies.
fn check_location(
    location: &Location,
    column_id: &str,
    section_id: &str,
    segment_id: &str,
    word: &WordId,
) -> Result<(), DbError> {
    let found = (
        location.column.column.id.as_str(),
        location.section.section.id.as_str(),
        location.segment.id.as_str(),
    );
    if found != (column_id, section_id, segment_id) {
        error!(
            "Word {} lies in column {}, section {}, segment {}, not in {}, {}, {}",
            word, found.0, found.1, found.2, column_id, section_id, segment_id
        );
        return Err(DbError::InvalidInsertionPoint);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::prefetch_bible_metadata;
    use crate::models::Anchored;
    use crate::studies;
    use crate::test::{connection, insert_passage, w, Fixture};

    fn starts<T: Anchored>(items: &[T]) -> Vec<String> {
        items
            .iter()
            .map(|i| i.starting_word_id().to_string())
            .collect()
    }

    fn structure(f: &mut Fixture) -> Vec<ColumnNode> {
        Outliner::load_structure(&f.passage_id, &mut f.conn).unwrap()
    }

    /// Every word between the first column start and `last` lies in exactly
    /// one column, section and segment.
    fn assert_covered(structure: &[ColumnNode], last: &WordId) {
        let first = &structure[0].column.starting_word_id;
        for column in structure {
            assert_eq!(column.sections[0].starting_word_id(), column.starting_word_id());
            for section in &column.sections {
                assert_eq!(section.segments[0].starting_word_id(), section.starting_word_id());
            }
        }
        for verse in first.verse()..=last.verse() {
            for word in 1..=5 {
                let id = WordId::new(first.book(), first.chapter(), verse, word).unwrap();
                let column = structure
                    .iter()
                    .filter(|c| c.starting_word_id().compare_position(&id) != Ordering::Greater)
                    .last()
                    .unwrap();
                assert!(locate_in_column(column, &id).is_ok(), "{id} is not covered");
            }
        }
    }

    #[test]
    fn insert_segment() {
        let mut f = Fixture::new("JN-003-016-001");

        let segment = Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &f.section_id,
            &w("JN-003-017-001"),
            &mut f.conn,
        )
        .unwrap();
        assert_eq!(segment.passage_section_id, f.section_id);

        let structure = structure(&mut f);
        let segments = &structure[0].sections[0].segments;
        assert_eq!(starts(segments), vec!["JN-003-016-001", "JN-003-017-001"]);
        for segment in segments {
            assert_eq!(segment.heading_one, None);
            assert_eq!(segment.heading_two, None);
            assert_eq!(segment.heading_three, None);
        }
    }

    #[test]
    fn insert_segment_at_boundaries() {
        let mut f = Fixture::new("JN-003-016-001");

        assert_eq!(
            Outliner::insert_segment(
                &f.user_id,
                &f.passage_id,
                &f.section_id,
                &w("JN-003-016-001"),
                &mut f.conn,
            ),
            Err(DbError::SegmentAtSectionStart)
        );
        assert_eq!(
            DbError::SegmentAtSectionStart.to_string(),
            "Cannot insert segment at the beginning of a section"
        );

        Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &f.section_id,
            &w("JN-003-017-001"),
            &mut f.conn,
        )
        .unwrap();
        let before = structure(&mut f);
        assert_eq!(
            Outliner::insert_segment(
                &f.user_id,
                &f.passage_id,
                &f.section_id,
                &w("JN-003-017-001"),
                &mut f.conn,
            ),
            Err(DbError::SegmentBoundary)
        );
        assert_eq!(structure(&mut f), before);
    }

    #[test]
    fn insert_segment_outside_section() {
        let mut f = Fixture::new("JN-003-016-001");
        let later = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-018-001"),
            &mut f.conn,
        )
        .unwrap();

        // Past the end of the first section
        assert_eq!(
            Outliner::insert_segment(
                &f.user_id,
                &f.passage_id,
                &f.section_id,
                &w("JN-003-019-001"),
                &mut f.conn,
            ),
            Err(DbError::InvalidInsertionPoint)
        );
        // Before the start of the second
        assert_eq!(
            Outliner::insert_segment(
                &f.user_id,
                &f.passage_id,
                &later.id,
                &w("JN-003-017-001"),
                &mut f.conn,
            ),
            Err(DbError::InvalidInsertionPoint)
        );
    }

    #[test]
    fn insert_column_mid_segment() {
        let mut f = Fixture::new("JN-003-016-001");

        let column = Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-018-004"),
            &mut f.conn,
        )
        .unwrap();

        let structure = structure(&mut f);
        assert_eq!(structure.len(), 2);
        assert_eq!(structure[1].column.id, column.id);

        for column in &structure {
            assert_eq!(column.sections.len(), 1);
            assert_eq!(column.sections[0].segments.len(), 1);
            assert_eq!(column.sections[0].section.color, Color::Blue);
        }
        let second = &structure[1].sections[0];
        assert_eq!(second.section.starting_word_id, w("JN-003-018-004"));
        assert_eq!(second.segments[0].starting_word_id, w("JN-003-018-004"));
        assert_eq!(second.segments[0].heading_one, None);

        assert_covered(&structure, &w("JN-003-021-001"));
    }

    #[test]
    fn insert_column_transfers_everything_after() {
        let mut f = Fixture::new("JN-003-016-001");
        Outliner::update_segment_heading(
            &f.user_id,
            &f.segment_id,
            HeadingType::One,
            Some("God so loved"),
            &mut f.conn,
        )
        .unwrap();
        let green = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-019-001"),
            &mut f.conn,
        )
        .unwrap();
        store::recolor_sections(&mut f.conn, &f.column_id, Color::Green).unwrap();
        let red = store::create_section(&mut f.conn, &f.column_id, &w("JN-003-020-001"), Color::Red)
            .unwrap();
        store::create_segment(&mut f.conn, &red.id, &w("JN-003-020-001")).unwrap();
        let moved = Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &green.id,
            &w("JN-003-019-006"),
            &mut f.conn,
        )
        .unwrap();
        let green_segment = store::segments_for_section(&mut f.conn, &green.id).unwrap()[0].clone();

        // Split the green section mid-segment
        let column = Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &green.id,
            &green_segment.id,
            &w("JN-003-019-003"),
            &mut f.conn,
        )
        .unwrap();

        let structure = structure(&mut f);
        assert_eq!(starts(&structure), vec!["JN-003-016-001", "JN-003-019-003"]);

        let first = &structure[0];
        assert_eq!(starts(&first.sections), vec!["JN-003-016-001", "JN-003-019-001"]);
        assert_eq!(first.sections[0].segments[0].heading_one.as_deref(), Some("God so loved"));
        assert_eq!(starts(&first.sections[1].segments), vec!["JN-003-019-001"]);

        let second = &structure[1];
        assert_eq!(second.column.id, column.id);
        assert_eq!(starts(&second.sections), vec!["JN-003-019-003", "JN-003-020-001"]);
        assert_eq!(second.sections[0].section.color, Color::Green);
        assert_eq!(second.sections[1].section.id, red.id);
        assert_eq!(second.sections[1].section.color, Color::Red);
        assert_eq!(
            starts(&second.sections[0].segments),
            vec!["JN-003-019-003", "JN-003-019-006"]
        );
        assert_eq!(second.sections[0].segments[1].id, moved.id);

        assert_covered(&structure, &w("JN-003-021-001"));
    }

    #[test]
    fn insert_column_at_section_start() {
        let mut f = Fixture::new("JN-003-016-001");
        let section = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-018-001"),
            &mut f.conn,
        )
        .unwrap();
        let segment = store::segments_for_section(&mut f.conn, &section.id).unwrap()[0].clone();

        let column = Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &section.id,
            &segment.id,
            &w("JN-003-018-001"),
            &mut f.conn,
        )
        .unwrap();

        // The existing section moves over as is
        let structure = structure(&mut f);
        assert_eq!(structure.len(), 2);
        assert_eq!(structure[0].sections.len(), 1);
        assert_eq!(structure[1].column.id, column.id);
        assert_eq!(structure[1].sections.len(), 1);
        assert_eq!(structure[1].sections[0].section.id, section.id);
        assert_eq!(structure[1].sections[0].segments[0].id, segment.id);
    }

    #[test]
    fn insert_column_at_column_start() {
        let mut f = Fixture::new("JN-003-016-001");
        let before = structure(&mut f);

        let result = Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-016-001"),
            &mut f.conn,
        );
        assert_eq!(result, Err(DbError::ColumnBoundary));
        assert_eq!(
            DbError::ColumnBoundary.to_string(),
            "Cannot insert column at the beginning of an existing column"
        );
        assert_eq!(structure(&mut f), before);
    }

    #[test]
    fn insert_column_with_wrong_parents() {
        let mut f = Fixture::new("JN-003-016-001");

        vec![
            ("missing".to_string(), f.section_id.clone(), f.segment_id.clone(), "Column"),
            (f.column_id.clone(), "missing".to_string(), f.segment_id.clone(), "Section"),
            (f.column_id.clone(), f.section_id.clone(), "missing".to_string(), "Segment"),
        ]
        .into_iter()
        .for_each(|(column, section, segment, entity)| {
            let result = Outliner::insert_column(
                &f.user_id,
                &f.passage_id,
                &column,
                &section,
                &segment,
                &w("JN-003-017-001"),
                &mut f.conn,
            );
            assert_eq!(result, Err(DbError::NotInPassage { entity }));
        });
        assert_eq!(
            DbError::NotInPassage { entity: "Column" }.to_string(),
            "Column not found or does not belong to this passage"
        );
    }

    #[test]
    fn insert_column_wrong_segment() {
        let mut f = Fixture::new("JN-003-016-001");
        let segment = Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &f.section_id,
            &w("JN-003-018-001"),
            &mut f.conn,
        )
        .unwrap();
        let before = structure(&mut f);

        // The word lies in the second segment, not the first
        let result = Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-019-001"),
            &mut f.conn,
        );
        assert_eq!(result, Err(DbError::InvalidInsertionPoint));
        assert_eq!(structure(&mut f), before);

        Outliner::insert_column(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &segment.id,
            &w("JN-003-019-001"),
            &mut f.conn,
        )
        .unwrap();
    }

    #[test]
    fn insert_section_mid_segment() {
        let mut f = Fixture::new("JN-003-016-001");
        Outliner::set_column_color(&f.user_id, &f.column_id, "purple", &mut f.conn).unwrap();

        let section = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-017-002"),
            &mut f.conn,
        )
        .unwrap();
        assert_eq!(section.color, Color::Purple);
        assert_eq!(section.passage_column_id, f.column_id);

        let structure = structure(&mut f);
        assert_eq!(structure.len(), 1);
        let sections = &structure[0].sections;
        assert_eq!(starts(sections), vec!["JN-003-016-001", "JN-003-017-002"]);
        assert_eq!(starts(&sections[0].segments), vec!["JN-003-016-001"]);
        assert_eq!(starts(&sections[1].segments), vec!["JN-003-017-002"]);
        assert_covered(&structure, &w("JN-003-021-001"));
    }

    #[test]
    fn insert_section_mid_segment_moves_later_segments() {
        let mut f = Fixture::new("JN-003-016-001");
        let later = Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &f.section_id,
            &w("JN-003-018-001"),
            &mut f.conn,
        )
        .unwrap();

        let section = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &f.segment_id,
            &w("JN-003-017-002"),
            &mut f.conn,
        )
        .unwrap();

        let kept = store::segments_for_section(&mut f.conn, &f.section_id).unwrap();
        assert_eq!(starts(&kept), vec!["JN-003-016-001"]);
        assert_eq!(kept[0].id, f.segment_id);

        let moved = store::segments_for_section(&mut f.conn, &section.id).unwrap();
        assert_eq!(starts(&moved), vec!["JN-003-017-002", "JN-003-018-001"]);
        assert_ne!(moved[0].id, f.segment_id);
        assert_eq!(moved[0].heading_one, None);
        assert_eq!(moved[1].id, later.id);

        assert_covered(&structure(&mut f), &w("JN-003-021-001"));
    }

    #[test]
    fn insert_section_at_segment_start() {
        let mut f = Fixture::new("JN-003-016-001");
        let segment = Outliner::insert_segment(
            &f.user_id,
            &f.passage_id,
            &f.section_id,
            &w("JN-003-017-001"),
            &mut f.conn,
        )
        .unwrap();
        Outliner::update_segment_note(&f.user_id, &segment.id, Some("kept"), &mut f.conn)
            .unwrap();

        let section = Outliner::insert_section(
            &f.user_id,
            &f.passage_id,
            &f.column_id,
            &f.section_id,
            &segment.id,
            &w("JN-003-017-001"),
            &mut f.conn,
        )
        .unwrap();

        // No new segment: the existing one moves
        let moved = store::segments_for_section(&mut f.conn, &section.id).unwrap();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].id, segment.id);
        assert_eq!(moved[0].note.as_deref(), Some("kept"));
    }

    #[test]
    fn insert_section_at_section_start() {
        let mut f = Fixture::new("JN-003-016-001");
        let before = structure(&mut f);

        assert_eq!(
            Outliner::insert_section(
                &f.user_id,
                &f.passage_id,
                &f.column_id,
                &f.section_id,
                &f.segment_id,
                &w("JN-003-016-001"),
                &mut f.conn,
            ),
            Err(DbError::SectionBoundary)
        );
        assert_eq!(structure(&mut f), before);
    }

    #[test]
    fn unauthorized_inserts() {
        let mut f = Fixture::new("JN-003-016-001");
        let word = w("JN-003-017-001");

        assert_eq!(
            Outliner::insert_column(
                &f.stranger_id,
                &f.passage_id,
                &f.column_id,
                &f.section_id,
                &f.segment_id,
                &word,
                &mut f.conn,
            ),
            Err(DbError::Unauthorized)
        );
        assert_eq!(
            Outliner::insert_section(
                &f.stranger_id,
                &f.passage_id,
                &f.column_id,
                &f.section_id,
                &f.segment_id,
                &word,
                &mut f.conn,
            ),
            Err(DbError::Unauthorized)
        );
        assert_eq!(
            Outliner::insert_segment(
                &f.stranger_id,
                &f.passage_id,
                &f.section_id,
                &word,
                &mut f.conn,
            ),
            Err(DbError::Unauthorized)
        );
        assert_eq!(
            Outliner::insert_segment(&f.user_id, "missing", &f.section_id, &word, &mut f.conn),
            Err(DbError::PassageNotFound {
                passage: "missing".to_string()
            })
        );
        assert_eq!(structure(&mut f).len(), 1);
    }

    #[test]
    fn segment_in_another_passage() {
        let mut f = Fixture::new("JN-003-016-001");
        let other = insert_passage(&mut f.conn, &f.study_id, 4, 1);

        assert_eq!(
            Outliner::insert_segment(
                &f.user_id,
                &other,
                &f.section_id,
                &w("JN-003-017-001"),
                &mut f.conn,
            ),
            Err(DbError::NotInPassage { entity: "Section" })
        );
    }

    #[test]
    fn insert_from_another_book() {
        let mut f = Fixture::new("JN-003-016-001");
        let before = structure(&mut f);
        let word = w("GEN-003-017-001");

        assert_eq!(
            Outliner::insert_segment(&f.user_id, &f.passage_id, &f.section_id, &word, &mut f.conn),
            Err(DbError::InvalidInsertionPoint)
        );
        assert_eq!(
            Outliner::insert_section(
                &f.user_id,
                &f.passage_id,
                &f.column_id,
                &f.section_id,
                &f.segment_id,
                &word,
                &mut f.conn,
            ),
            Err(DbError::InvalidInsertionPoint)
        );
        assert_eq!(
            Outliner::insert_column(
                &f.user_id,
                &f.passage_id,
                &f.column_id,
                &f.section_id,
                &f.segment_id,
                &word,
                &mut f.conn,
            ),
            Err(DbError::InvalidInsertionPoint)
        );
        assert_eq!(structure(&mut f), before);
    }

    #[test]
    fn update_segment_fields() {
        let mut f = Fixture::new("JN-003-016-001");

        Outliner::update_segment_heading(
            &f.user_id,
            &f.segment_id,
            HeadingType::Three,
            Some("Eternal life"),
            &mut f.conn,
        )
        .unwrap();
        Outliner::update_segment_commentary(
            &f.user_id,
            &f.segment_id,
            Some("A much longer piece of commentary."),
            &mut f.conn,
        )
        .unwrap();

        let segment = Outliner::get_segment(&f.user_id, &f.segment_id, &mut f.conn).unwrap();
        assert_eq!(segment.heading_three.as_deref(), Some("Eternal life"));
        assert_eq!(
            segment.commentary.as_deref(),
            Some("A much longer piece of commentary.")
        );

        assert_eq!(
            Outliner::update_segment_heading(
                &f.stranger_id,
                &f.segment_id,
                HeadingType::One,
                Some("Mine now"),
                &mut f.conn,
            ),
            Err(DbError::SegmentUnauthorized)
        );
        assert_eq!(
            Outliner::get_segment(&f.stranger_id, &f.segment_id, &mut f.conn),
            Err(DbError::SegmentUnauthorized)
        );
        assert_eq!(
            Outliner::update_segment_commentary(&f.user_id, "missing", None, &mut f.conn),
            Err(DbError::SegmentNotFound)
        );
    }

    #[test]
    fn update_segment_note_length() {
        let mut f = Fixture::new("JN-003-016-001");

        let too_long = "a".repeat(141);
        assert_eq!(
            Outliner::update_segment_note(&f.user_id, &f.segment_id, Some(&too_long), &mut f.conn),
            Err(DbError::NoteTooLong { length: 141 })
        );
        assert_eq!(
            DbError::NoteTooLong { length: 141 }.to_string(),
            "Note exceeds 140 character limit"
        );
        // Rejected before the segment is even looked up
        assert_eq!(
            Outliner::update_segment_note(&f.user_id, "missing", Some(&too_long), &mut f.conn),
            Err(DbError::NoteTooLong { length: 141 })
        );

        let limit = "é".repeat(140);
        Outliner::update_segment_note(&f.user_id, &f.segment_id, Some(&limit), &mut f.conn)
            .unwrap();
        let segment = Outliner::get_segment(&f.user_id, &f.segment_id, &mut f.conn).unwrap();
        assert_eq!(segment.note, Some(limit));

        Outliner::update_segment_note(&f.user_id, &f.segment_id, None, &mut f.conn).unwrap();
        let segment = Outliner::get_segment(&f.user_id, &f.segment_id, &mut f.conn).unwrap();
        assert_eq!(segment.note, None);
    }

    #[test]
    fn set_column_color() {
        let mut f = Fixture::new("JN-003-016-001");
        for start in ["JN-003-017-001", "JN-003-018-001"] {
            store::create_section(&mut f.conn, &f.column_id, &w(start), Color::Red).unwrap();
        }

        assert_eq!(
            Outliner::set_column_color(&f.user_id, &f.column_id, "green", &mut f.conn),
            Ok(3)
        );
        let painted = structure(&mut f);
        assert!(painted[0]
            .sections
            .iter()
            .all(|s| s.section.color == Color::Green));

        assert_eq!(
            Outliner::set_column_color(&f.user_id, &f.column_id, "magenta", &mut f.conn),
            Err(DbError::InvalidColor {
                color: "magenta".to_string()
            })
        );
        assert_eq!(
            Outliner::set_column_color(&f.user_id, &f.column_id, "RED", &mut f.conn),
            Err(DbError::InvalidColor {
                color: "RED".to_string()
            })
        );
        assert_eq!(
            Outliner::set_column_color(&f.stranger_id, &f.column_id, "red", &mut f.conn),
            Err(DbError::Unauthorized)
        );
        assert_eq!(
            Outliner::set_column_color(&f.user_id, "missing", "red", &mut f.conn),
            Err(DbError::ColumnNotFound)
        );
        assert_eq!(structure(&mut f), painted);
    }

    #[test]
    fn default_structure() {
        let mut conn = connection();
        let metadata = prefetch_bible_metadata(&mut conn).unwrap();
        let user = studies::create_user(&mut conn, "Owner").unwrap();
        let study = studies::create_study(&mut conn, &user.id, "John").unwrap();
        let passage_id = insert_passage(&mut conn, &study.id, 3, 16);

        let node = Outliner::create_default_passage_structure(
            &metadata,
            &passage_id,
            "NT",
            "john",
            3,
            16,
            &mut conn,
        )
        .unwrap();
        assert_eq!(node.column.starting_word_id, w("JHN-003-016-001"));
        assert_eq!(node.sections.len(), 1);
        assert_eq!(node.sections[0].section.color, Color::Blue);
        assert_eq!(node.sections[0].segments.len(), 1);
        assert_eq!(node.sections[0].segments[0].heading_one, None);

        assert_eq!(
            Outliner::load_structure(&passage_id, &mut conn).unwrap(),
            vec![node]
        );

        assert_eq!(
            Outliner::create_default_passage_structure(
                &metadata,
                &passage_id,
                "NT",
                "john",
                3,
                16,
                &mut conn,
            ),
            Err(DbError::StructureExists {
                passage: passage_id.clone()
            })
        );
    }

    #[test]
    fn default_structure_unknown_book() {
        let mut conn = connection();
        let metadata = prefetch_bible_metadata(&mut conn).unwrap();
        let user = studies::create_user(&mut conn, "Owner").unwrap();
        let study = studies::create_study(&mut conn, &user.id, "Apocrypha").unwrap();
        let passage_id = insert_passage(&mut conn, &study.id, 1, 1);

        let node = Outliner::create_default_passage_structure(
            &metadata,
            &passage_id,
            "OT",
            "1 esdras",
            1,
            1,
            &mut conn,
        )
        .unwrap();
        assert_eq!(node.column.starting_word_id, w("1ESDRAS-001-001-001"));
    }
}
