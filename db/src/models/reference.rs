use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Match, Regex};
use serde_derive::Serialize;

use crate::DbError;

/// Model representing the Bible reference of a passage, as typed by a user
/// when adding a passage to a study.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PassageReference {
    pub book: String,
    pub from_chapter: i32,
    pub from_verse: i32,
    pub to_chapter: i32,
    pub to_verse: i32,
}

impl fmt::Display for PassageReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let PassageReference {
            book,
            from_chapter,
            from_verse,
            to_chapter,
            to_verse,
        } = self;

        if from_chapter != to_chapter {
            write!(
                f,
                "{} {}:{}-{}:{}",
                book, from_chapter, from_verse, to_chapter, to_verse
            )
        } else if from_verse == to_verse {
            write!(f, "{} {}:{}", book, from_chapter, from_verse)
        } else {
            write!(f, "{} {}:{}-{}", book, from_chapter, from_verse, to_verse)
        }
    }
}

impl FromStr for PassageReference {
    type Err = DbError;

    fn from_str(s: &str) -> Result<PassageReference, Self::Err> {
        lazy_static! {
            static ref REF_RE: Regex =
                Regex::new(r"^(\w+(?: [a-zA-Z]+(?: [a-zA-Z]+)?)?)(?:\.| )((?:[0-9\-:\.])+)$")
                    .unwrap();
            static ref CV_RE: Regex =
                Regex::new(r"^(\d{1,3})[:\.](\d{1,3})(?:-(?:(\d{1,3})[:\.])?(\d{1,3}))?$")
                    .unwrap();
        }

        let ref_caps = REF_RE.captures(s.trim()).ok_or_else(|| invalid_reference(s))?;
        let (book, cv) = match (ref_caps.get(1), ref_caps.get(2)) {
            (Some(book), Some(cv)) => (book.as_str().to_string(), cv.as_str()),
            _ => return Err(invalid_reference(s)),
        };
        let cv_caps = CV_RE.captures(cv).ok_or_else(|| invalid_reference(s))?;

        let reference = match (cv_caps.get(1), cv_caps.get(2), cv_caps.get(3), cv_caps.get(4)) {
            // One verse
            (Some(chapter), Some(verse), None, None) => {
                let chapter = parse_num_match(chapter)?;
                let verse = parse_num_match(verse)?;
                PassageReference {
                    book,
                    from_chapter: chapter,
                    from_verse: verse,
                    to_chapter: chapter,
                    to_verse: verse,
                }
            }
            // Verse range within one chapter
            (Some(chapter), Some(from_verse), None, Some(to_verse)) => {
                let chapter = parse_num_match(chapter)?;
                PassageReference {
                    book,
                    from_chapter: chapter,
                    from_verse: parse_num_match(from_verse)?,
                    to_chapter: chapter,
                    to_verse: parse_num_match(to_verse)?,
                }
            }
            // Range spanning chapters
            (Some(from_chapter), Some(from_verse), Some(to_chapter), Some(to_verse)) => {
                PassageReference {
                    book,
                    from_chapter: parse_num_match(from_chapter)?,
                    from_verse: parse_num_match(from_verse)?,
                    to_chapter: parse_num_match(to_chapter)?,
                    to_verse: parse_num_match(to_verse)?,
                }
            }
            _ => return Err(invalid_reference(s)),
        };

        if (reference.to_chapter, reference.to_verse)
            < (reference.from_chapter, reference.from_verse)
            || reference.from_chapter < 1
            || reference.from_verse < 1
        {
            return Err(invalid_reference(s));
        }

        Ok(reference)
    }
}

/// Parse a [Match](regex::Match) into an i32.
fn parse_num_match(m: Match) -> Result<i32, DbError> {
    m.as_str().parse().map_err(|_| DbError::InvalidReference {
        reference: m.as_str().to_string(),
    })
}

/// Create an invalid reference error from the input.
fn invalid_reference(s: &str) -> DbError {
    DbError::InvalidReference {
        reference: s.to_string(),
    }
}
