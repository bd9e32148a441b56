use std::str::FromStr;

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde_derive::Serialize;

use crate::schema::{book_abbreviations, books, passages, studies, users};
use crate::DbError;

/// Current UTC time, formatted for the TEXT timestamp columns.
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Enum for the testaments in the Bible (Old or New). This is mapped
/// to the `testament` column of the `books` and `passages` tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum Testament {
    #[serde(rename = "OT")]
    Old,
    #[serde(rename = "NT")]
    New,
}

impl Testament {
    pub fn id(self) -> &'static str {
        match self {
            Testament::Old => "OT",
            Testament::New => "NT",
        }
    }
}

impl FromStr for Testament {
    type Err = ();

    fn from_str(s: &str) -> Result<Testament, ()> {
        match s.to_uppercase().as_str() {
            "OT" | "OLD" => Ok(Testament::Old),
            "NT" | "NEW" => Ok(Testament::New),
            _ => Err(()),
        }
    }
}

impl FromSql<Text, Sqlite> for Testament {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let testament = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        testament
            .parse()
            .map_err(|_| "Unexpected testament in the Bible".into())
    }
}

impl ToSql<Text, Sqlite> for Testament {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.id());
        Ok(IsNull::No)
    }
}

/// Model representing a book in the Bible.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = books)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Book {
    pub id: i32,
    pub name: String,
    /// Abbreviation used as the book component of word IDs.
    pub code: String,
    pub chapter_count: i32,
    pub testament: Testament,
}

/// Model representing a Bible book's abbreviation.
#[derive(Clone, Debug, Queryable, Selectable)]
#[diesel(table_name = book_abbreviations)]
pub struct BookAbbreviation {
    pub id: i32,
    pub book_id: i32,
    pub abbreviation: String,
}

#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub created_at: &'a str,
}

/// A user's study, the owner of one or more passages.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = studies)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = studies)]
pub struct NewStudy<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Model representing a passage of a study.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = passages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub id: String,
    pub study_id: String,
    pub testament: Testament,
    pub book_id: String,
    pub book_name: String,
    pub from_chapter: i32,
    pub from_verse: i32,
    pub to_chapter: i32,
    pub to_verse: i32,
    pub display_order: i32,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = passages)]
pub struct NewPassage<'a> {
    pub id: &'a str,
    pub study_id: &'a str,
    pub testament: Testament,
    pub book_id: &'a str,
    pub book_name: &'a str,
    pub from_chapter: i32,
    pub from_verse: i32,
    pub to_chapter: i32,
    pub to_verse: i32,
    pub display_order: i32,
    pub created_at: &'a str,
}

mod reference;
mod structure;
pub mod word_id;

pub use self::reference::PassageReference;
pub use self::structure::{
    Anchored, Color, Column, ColumnNode, HeadingType, NewColumn, NewSection, NewSegment, Section,
    SectionNode, Segment, NOTE_MAX_CHARS,
};
pub use self::word_id::WordId;

/// Checks a note against [NOTE_MAX_CHARS](NOTE_MAX_CHARS) before it reaches the store.
pub fn validate_note(note: Option<&str>) -> Result<(), DbError> {
    match note.map(|n| n.chars().count()) {
        Some(length) if length > NOTE_MAX_CHARS => Err(DbError::NoteTooLong { length }),
        _ => Ok(()),
    }
}
