use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::DbError;

lazy_static! {
    static ref WORD_ID_RE: Regex = Regex::new(r"^([A-Z0-9]+)-(\d{3})-(\d{3})-(\d{3})$").unwrap();
}

/// Largest value a chapter, verse or word component can take while staying
/// three digits wide.
pub const MAX_COMPONENT: u16 = 999;

/// Stable identifier of a single word in the canonical text, shaped like
/// `JHN-003-016-001` (book, chapter, verse, word within the verse).
///
/// Word IDs are only ever used as ordering keys. Two IDs of the same passage
/// are ordered by chapter, then verse, then word; the book never takes part
/// in that comparison because it is constant within a passage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub struct WordId {
    book: String,
    chapter: u16,
    verse: u16,
    word: u16,
}

impl WordId {
    pub fn new(book: &str, chapter: u16, verse: u16, word: u16) -> Result<WordId, DbError> {
        if chapter > MAX_COMPONENT || verse > MAX_COMPONENT || word > MAX_COMPONENT {
            return Err(DbError::InvalidWordId {
                word_id: format!("{}-{}-{}-{}", book, chapter, verse, word),
            });
        }
        format!("{}-{:03}-{:03}-{:03}", book, chapter, verse, word).parse()
    }

    /// The first word of the given verse.
    pub fn first_of_verse(book: &str, chapter: u16, verse: u16) -> Result<WordId, DbError> {
        WordId::new(book, chapter, verse, 1)
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn chapter(&self) -> u16 {
        self.chapter
    }

    pub fn verse(&self) -> u16 {
        self.verse
    }

    pub fn word(&self) -> u16 {
        self.word
    }

    /// Reading-order position of the word, ignoring the book.
    pub fn position(&self) -> (u16, u16, u16) {
        (self.chapter, self.verse, self.word)
    }

    /// Compares two IDs of the same passage by chapter, verse and word, in
    /// that order. The book is not compared, so callers must not mix IDs from
    /// different passages.
    pub fn compare_position(&self, other: &WordId) -> Ordering {
        self.position().cmp(&other.position())
    }
}

impl Ord for WordId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_position(other)
            .then_with(|| self.book.cmp(&other.book))
    }
}

impl PartialOrd for WordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{:03}-{:03}-{:03}",
            self.book, self.chapter, self.verse, self.word
        )
    }
}

impl FromStr for WordId {
    type Err = DbError;

    fn from_str(s: &str) -> Result<WordId, Self::Err> {
        let invalid = || DbError::InvalidWordId {
            word_id: s.to_string(),
        };
        let caps = WORD_ID_RE.captures(s).ok_or_else(invalid)?;
        let number = |i: usize| caps[i].parse::<u16>().map_err(|_| invalid());

        Ok(WordId {
            book: caps[1].to_string(),
            chapter: number(2)?,
            verse: number(3)?,
            word: number(4)?,
        })
    }
}

impl Serialize for WordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromSql<Text, Sqlite> for WordId {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(raw.parse()?)
    }
}

impl ToSql<Text, Sqlite> for WordId {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.to_string());
        Ok(IsNull::No)
    }
}
