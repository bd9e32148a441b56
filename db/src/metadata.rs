use std::collections::HashMap;

use diesel::prelude::*;

use crate::models::{Book, BookAbbreviation, Testament};
use crate::DbError;

/// Book data prefetched once at startup and passed by reference wherever
/// a book has to be resolved.
#[derive(Clone, Debug, Default)]
pub struct BibleMetadata {
    books: Vec<Book>,
    /// Lowercased alias to index into `books`.
    aliases: HashMap<String, usize>,
}

impl BibleMetadata {
    pub fn new(books: Vec<Book>, abbreviations: Vec<BookAbbreviation>) -> Self {
        let positions: HashMap<i32, usize> =
            books.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

        let mut aliases = HashMap::new();
        for (i, book) in books.iter().enumerate() {
            aliases.insert(book.code.to_lowercase(), i);
            aliases.insert(book.name.to_lowercase(), i);
        }
        for abbreviation in abbreviations {
            if let Some(&i) = positions.get(&abbreviation.book_id) {
                aliases.insert(abbreviation.abbreviation.to_lowercase(), i);
            }
        }

        Self { books, aliases }
    }

    /// All books in canonical order.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Looks up a book by code, name or any registered abbreviation, ignoring
    /// case.
    pub fn book(&self, name: &str) -> Option<&Book> {
        self.aliases
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.books[i])
    }

    /// Word ID abbreviation of the book, or `None` when the book is unknown
    /// or does not belong to the given testament.
    pub fn book_abbreviation(&self, testament_id: &str, book_id: &str) -> Option<&str> {
        let testament: Testament = testament_id.parse().ok()?;
        self.book(book_id)
            .filter(|b| b.testament == testament)
            .map(|b| b.code.as_str())
    }
}

/// Loads every book and its abbreviations from the database.
pub fn prefetch_bible_metadata(conn: &mut SqliteConnection) -> Result<BibleMetadata, DbError> {
    use crate::schema::book_abbreviations as ba;
    use crate::schema::books as b;

    let books = b::table
        .order_by(b::id)
        .select(Book::as_select())
        .load::<Book>(conn)
        .map_err(|e| DbError::Other {
            cause: format!("Could not preload book data from database. Cause: {e}"),
        })?;
    let abbreviations = ba::table
        .select(BookAbbreviation::as_select())
        .load::<BookAbbreviation>(conn)
        .map_err(|e| DbError::Other {
            cause: format!("Could not preload book abbreviations from database. Cause: {e}"),
        })?;

    Ok(BibleMetadata::new(books, abbreviations))
}
