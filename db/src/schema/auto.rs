table! {
    book_abbreviations (id) {
        id -> Integer,
        book_id -> Integer,
        abbreviation -> Text,
    }
}

table! {
    books (id) {
        id -> Integer,
        name -> Text,
        code -> Text,
        chapter_count -> Integer,
        testament -> Text,
    }
}

table! {
    passage_columns (id) {
        id -> Text,
        passage_id -> Text,
        starting_word_id -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

table! {
    passage_sections (id) {
        id -> Text,
        passage_column_id -> Text,
        starting_word_id -> Text,
        color -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

table! {
    passage_segments (id) {
        id -> Text,
        passage_section_id -> Text,
        starting_word_id -> Text,
        heading_one -> Nullable<Text>,
        heading_two -> Nullable<Text>,
        heading_three -> Nullable<Text>,
        note -> Nullable<Text>,
        commentary -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

table! {
    passages (id) {
        id -> Text,
        study_id -> Text,
        testament -> Text,
        book_id -> Text,
        book_name -> Text,
        from_chapter -> Integer,
        from_verse -> Integer,
        to_chapter -> Integer,
        to_verse -> Integer,
        display_order -> Integer,
        created_at -> Text,
    }
}

table! {
    studies (id) {
        id -> Text,
        user_id -> Text,
        title -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

table! {
    users (id) {
        id -> Text,
        name -> Text,
        created_at -> Text,
    }
}

joinable!(book_abbreviations -> books (book_id));
joinable!(passage_columns -> passages (passage_id));
joinable!(passage_sections -> passage_columns (passage_column_id));
joinable!(passage_segments -> passage_sections (passage_section_id));
joinable!(passages -> studies (study_id));
joinable!(studies -> users (user_id));

allow_tables_to_appear_in_same_query!(
    book_abbreviations,
    books,
    passage_columns,
    passage_sections,
    passage_segments,
    passages,
    studies,
    users,
);
