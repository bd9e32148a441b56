#![warn(clippy::all)]

use std::env;
use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use serde::Serialize;

use db::models::PassageReference;
use db::{
    build_pool, prefetch_bible_metadata, run_migrations, studies, DbConnection,
    HeadingType, Outliner, PassageStructure, WordId,
};

#[derive(Parser)]
#[command(name = "outline", version)]
#[command(about = "Administers passage outlines: columns, sections and segments")]
struct Cli {
    /// SQLite database to use. Defaults to $DATABASE_URL, then /tmp/outline.db.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs pending database migrations
    Migrate,
    /// Creates a user
    AddUser { name: String },
    /// Creates a study owned by a user
    AddStudy { user: String, title: String },
    /// Adds a passage such as "John 3:16-21" to a study
    AddPassage {
        user: String,
        study: String,
        reference: PassageReference,
    },
    /// Prints the structure of a passage as JSON
    Show { passage: String },
    /// Starts a new column at a word
    InsertColumn {
        user: String,
        passage: String,
        column: String,
        section: String,
        segment: String,
        word: WordId,
    },
    /// Starts a new section at a word
    InsertSection {
        user: String,
        passage: String,
        column: String,
        section: String,
        segment: String,
        word: WordId,
    },
    /// Starts a new segment at a word
    InsertSegment {
        user: String,
        passage: String,
        section: String,
        word: WordId,
    },
    /// Sets a segment heading (one, two or three); omit the text to clear it
    Heading {
        user: String,
        segment: String,
        heading: HeadingType,
        text: Option<String>,
    },
    /// Sets a segment note; omit the text to clear it
    Note {
        user: String,
        segment: String,
        text: Option<String>,
    },
    /// Sets a segment commentary; omit the text to clear it
    Commentary {
        user: String,
        segment: String,
        text: Option<String>,
    },
    /// Paints every section of a column
    Color {
        user: String,
        column: String,
        color: String,
    },
    /// Creates the default structure of every passage that has none
    Backfill,
    /// Prints row counts of the structure tables
    Status,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command, conn: &mut DbConnection) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Migrate => {
            run_migrations(conn)?;
            info!("Database is up to date");
        }
        Command::AddUser { name } => print_json(&studies::create_user(conn, &name)?)?,
        Command::AddStudy { user, title } => {
            print_json(&studies::create_study(conn, &user, &title)?)?
        }
        Command::AddPassage {
            user,
            study,
            reference,
        } => {
            let metadata = prefetch_bible_metadata(conn)?;
            let (passage, structure) =
                studies::create_passage(conn, &metadata, &user, &study, &reference)?;
            print_json(&passage)?;
            print_json(&structure)?;
        }
        Command::Show { passage } => {
            studies::find_passage(conn, &passage)?;
            print_json(&Outliner::load_structure(&passage, conn)?)?;
        }
        Command::InsertColumn {
            user,
            passage,
            column,
            section,
            segment,
            word,
        } => print_json(&Outliner::insert_column(
            &user, &passage, &column, &section, &segment, &word, conn,
        )?)?,
        Command::InsertSection {
            user,
            passage,
            column,
            section,
            segment,
            word,
        } => print_json(&Outliner::insert_section(
            &user, &passage, &column, &section, &segment, &word, conn,
        )?)?,
        Command::InsertSegment {
            user,
            passage,
            section,
            word,
        } => print_json(&Outliner::insert_segment(
            &user, &passage, &section, &word, conn,
        )?)?,
        Command::Heading {
            user,
            segment,
            heading,
            text,
        } => {
            Outliner::update_segment_heading(&user, &segment, heading, text.as_deref(), conn)?;
            print_json(&Outliner::get_segment(&user, &segment, conn)?)?;
        }
        Command::Note {
            user,
            segment,
            text,
        } => {
            Outliner::update_segment_note(&user, &segment, text.as_deref(), conn)?;
            print_json(&Outliner::get_segment(&user, &segment, conn)?)?;
        }
        Command::Commentary {
            user,
            segment,
            text,
        } => {
            Outliner::update_segment_commentary(&user, &segment, text.as_deref(), conn)?;
            print_json(&Outliner::get_segment(&user, &segment, conn)?)?;
        }
        Command::Color {
            user,
            column,
            color,
        } => {
            let painted = Outliner::set_column_color(&user, &column, &color, conn)?;
            println!("{}", painted);
        }
        Command::Backfill => {
            let metadata = prefetch_bible_metadata(conn)?;
            let filled = studies::backfill_default_structures(conn, &metadata)?;
            println!("{}", filled);
        }
        Command::Status => print_json(&studies::structure_stats(conn)?)?,
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    dotenv().ok();

    // Set up logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // Get env configuration
    let url = cli
        .database_url
        .or_else(|| env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "/tmp/outline.db".to_string());

    let result = build_pool(&url)
        .and_then(|pool| Ok(pool.get()?))
        .map_err(Box::<dyn Error>::from)
        .and_then(|mut conn| run(cli.command, &mut conn));

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
