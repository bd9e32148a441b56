use std::fmt;
use std::str::FromStr;

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde_derive::Serialize;

use crate::models::WordId;
use crate::schema::{passage_columns, passage_sections, passage_segments};
use crate::DbError;

/// Maximum length of a segment note, in characters.
pub const NOTE_MAX_CHARS: usize = 140;

/// Palette a section can be painted with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Green,
    Aqua,
    #[default]
    Blue,
    Purple,
    Pink,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Aqua,
        Color::Blue,
        Color::Purple,
        Color::Pink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Aqua => "aqua",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Pink => "pink",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Color, Self::Err> {
        Color::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DbError::InvalidColor {
                color: s.to_string(),
            })
    }
}

impl FromSql<Text, Sqlite> for Color {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let color = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(color.parse()?)
    }
}

impl ToSql<Text, Sqlite> for Color {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

/// Which of a segment's three headings to update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadingType {
    One,
    Two,
    Three,
}

impl FromStr for HeadingType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<HeadingType, Self::Err> {
        match s {
            "one" => Ok(HeadingType::One),
            "two" => Ok(HeadingType::Two),
            "three" => Ok(HeadingType::Three),
            _ => Err(DbError::InvalidHeadingType {
                heading: s.to_string(),
            }),
        }
    }
}

/// Anything positioned in a passage by the word it starts at.
pub trait Anchored {
    fn starting_word_id(&self) -> &WordId;
}

/// Top-level partition of a passage.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = passage_columns)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub passage_id: String,
    pub starting_word_id: WordId,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = passage_columns)]
pub struct NewColumn<'a> {
    pub id: &'a str,
    pub passage_id: &'a str,
    pub starting_word_id: &'a WordId,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Colored partition of a column.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = passage_sections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub passage_column_id: String,
    pub starting_word_id: WordId,
    pub color: Color,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = passage_sections)]
pub struct NewSection<'a> {
    pub id: &'a str,
    pub passage_column_id: &'a str,
    pub starting_word_id: &'a WordId,
    pub color: Color,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Leaf partition of a section, carrying the user's headings and notes.
#[derive(Clone, Debug, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = passage_segments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub passage_section_id: String,
    pub starting_word_id: WordId,
    pub heading_one: Option<String>,
    pub heading_two: Option<String>,
    pub heading_three: Option<String>,
    pub note: Option<String>,
    pub commentary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// New segments never carry headings, notes or commentary.
#[derive(Debug, Insertable)]
#[diesel(table_name = passage_segments)]
pub struct NewSegment<'a> {
    pub id: &'a str,
    pub passage_section_id: &'a str,
    pub starting_word_id: &'a WordId,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// A section along with its segments, ordered by starting word.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionNode {
    #[serde(flatten)]
    pub section: Section,
    pub segments: Vec<Segment>,
}

/// A column along with its sections, ordered by starting word.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnNode {
    #[serde(flatten)]
    pub column: Column,
    pub sections: Vec<SectionNode>,
}

impl Anchored for Column {
    fn starting_word_id(&self) -> &WordId {
        &self.starting_word_id
    }
}

impl Anchored for Section {
    fn starting_word_id(&self) -> &WordId {
        &self.starting_word_id
    }
}

impl Anchored for Segment {
    fn starting_word_id(&self) -> &WordId {
        &self.starting_word_id
    }
}

impl Anchored for SectionNode {
    fn starting_word_id(&self) -> &WordId {
        &self.section.starting_word_id
    }
}

impl Anchored for ColumnNode {
    fn starting_word_id(&self) -> &WordId {
        &self.column.starting_word_id
    }
}
