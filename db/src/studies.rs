//! Users, studies and passages: the ownership chain every structure
//! operation is authorized against.

use diesel::prelude::*;
use log::{info, warn};
use serde_derive::Serialize;
use uuid::Uuid;

use crate::metadata::BibleMetadata;
use crate::models::{
    current_timestamp, ColumnNode, NewPassage, NewStudy, NewUser, Passage, PassageReference, Study,
    User,
};
use crate::outliner::{Outliner, PassageStructure};
use crate::schema::{passage_columns, passage_sections, passage_segments, passages, studies, users};
use crate::DbError;

/// Row counts reported by `outline status`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureStats {
    pub passages: i64,
    pub columns: i64,
    pub sections: i64,
    pub segments: i64,
    pub passages_missing_structure: i64,
}

pub fn create_user(conn: &mut SqliteConnection, name: &str) -> Result<User, DbError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(users::table)
        .values(&NewUser {
            id: &id,
            name,
            created_at: &now,
        })
        .execute(conn)?;

    Ok(User {
        id,
        name: name.to_string(),
        created_at: now,
    })
}

pub fn create_study(
    conn: &mut SqliteConnection,
    user_id: &str,
    title: &str,
) -> Result<Study, DbError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(studies::table)
        .values(&NewStudy {
            id: &id,
            user_id,
            title,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    Ok(Study {
        id,
        user_id: user_id.to_string(),
        title: title.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn find_passage(conn: &mut SqliteConnection, passage_id: &str) -> Result<Passage, DbError> {
    passages::table
        .find(passage_id)
        .select(Passage::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DbError::PassageNotFound {
            passage: passage_id.to_string(),
        })
}

/// Adds a passage to a study and gives it its default structure.
///
/// The book of the reference is resolved through `metadata`, and the
/// reference's chapters must exist in that book.
pub fn create_passage(
    conn: &mut SqliteConnection,
    metadata: &BibleMetadata,
    user_id: &str,
    study_id: &str,
    reference: &PassageReference,
) -> Result<(Passage, ColumnNode), DbError> {
    let book = metadata
        .book(&reference.book)
        .ok_or_else(|| DbError::BookNotFound {
            book: reference.book.clone(),
        })?;
    if reference.to_chapter > book.chapter_count {
        return Err(DbError::InvalidReference {
            reference: reference.to_string(),
        });
    }
    // Book keys are the lowercased name without spaces, e.g. `1corinthians`.
    let book_id: String = book
        .name
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    conn.immediate_transaction(|conn| {
        let owner = studies::table
            .find(study_id)
            .select(studies::user_id)
            .first::<String>(conn)
            .optional()?
            .ok_or_else(|| DbError::StudyNotFound {
                study: study_id.to_string(),
            })?;
        if owner != user_id {
            return Err(DbError::Unauthorized);
        }

        let display_order = passages::table
            .filter(passages::study_id.eq(study_id))
            .count()
            .get_result::<i64>(conn)?;

        let id = Uuid::new_v4().to_string();
        let now = current_timestamp();
        diesel::insert_into(passages::table)
            .values(&NewPassage {
                id: &id,
                study_id,
                testament: book.testament,
                book_id: &book_id,
                book_name: &book.name,
                from_chapter: reference.from_chapter,
                from_verse: reference.from_verse,
                to_chapter: reference.to_chapter,
                to_verse: reference.to_verse,
                display_order: display_order as i32,
                created_at: &now,
            })
            .execute(conn)?;

        let structure = Outliner::create_default_passage_structure(
            metadata,
            &id,
            book.testament.id(),
            &book_id,
            reference.from_chapter,
            reference.from_verse,
            conn,
        )?;
        let passage = find_passage(conn, &id)?;

        info!("Added passage {} ({}) to study {}", passage.id, reference, study_id);
        Ok((passage, structure))
    })
}

/// Passages that have no column at all.
pub fn passages_missing_structure(conn: &mut SqliteConnection) -> Result<Vec<Passage>, DbError> {
    passages::table
        .left_join(passage_columns::table)
        .filter(passage_columns::id.is_null())
        .order_by(passages::created_at.asc())
        .select(Passage::as_select())
        .load::<Passage>(conn)
        .map_err(DbError::from)
}

/// Gives every passage without a structure its default one, all or nothing.
/// Returns how many passages were filled in.
pub fn backfill_default_structures(
    conn: &mut SqliteConnection,
    metadata: &BibleMetadata,
) -> Result<usize, DbError> {
    conn.immediate_transaction(|conn| {
        let missing = passages_missing_structure(conn)?;
        if missing.is_empty() {
            info!("All passages already have a structure");
            return Ok(0);
        }
        warn!("{} passage(s) have no structure", missing.len());

        for passage in &missing {
            Outliner::create_default_passage_structure(
                metadata,
                &passage.id,
                passage.testament.id(),
                &passage.book_id,
                passage.from_chapter,
                passage.from_verse,
                conn,
            )?;
        }

        info!("Backfilled {} passage structure(s)", missing.len());
        Ok(missing.len())
    })
}

pub fn structure_stats(conn: &mut SqliteConnection) -> Result<StructureStats, DbError> {
    Ok(StructureStats {
        passages: passages::table.count().get_result(conn)?,
        columns: passage_columns::table.count().get_result(conn)?,
        sections: passage_sections::table.count().get_result(conn)?,
        segments: passage_segments::table.count().get_result(conn)?,
        passages_missing_structure: passages_missing_structure(conn)?.len() as i64,
    })
}
