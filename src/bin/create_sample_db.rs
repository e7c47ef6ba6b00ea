use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;

use mmex_reader::{
    sample::create_sample_database,
    schema::TagTables,
};

/// A utility for creating a sample Money Manager Ex database to read with mmex_reader.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// Leave out the tag tables, like databases from older MMEX versions.
    #[arg(long)]
    without_tags: bool,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        Some(extension) if !extension.is_empty() => {}
        _ => {
            eprintln!("Output path must include a file extension (e.g., 'data.mmb').");
            exit(1);
        }
    }

    if output_path.exists() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    let tags = if args.without_tags {
        TagTables::Absent
    } else {
        TagTables::Present
    };

    println!("Creating sample database at {output_path:#?}");
    create_sample_database(output_path, tags)?;

    println!("Success!");

    Ok(())
}
