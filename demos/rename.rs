//! Rename pipeline over a file
//!
//! Pipeline:
//! 1. Read the input file
//! 2. Replace the login name
//! 3. Tee the intermediate text to a trace file
//! 4. Replace the first name
//! 5. Tee again to a second trace file
//! 6. Replace the surname, keeping the rest of the line
//! 7. Write the final text
//!
//! Usage: cargo run --example rename -- <input> <output-dir>

use std::env;
use std::path::PathBuf;
use text_pipeline::{pattern_replace, tee, FileSink, FileSource, Pipeline, Source};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let input = PathBuf::from(args.next().unwrap_or_else(|| "foo.txt".to_string()));
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let mut reader = FileSource::open(&input)?;
    let mut login = pattern_replace("login", "adinn", "msmith")?;
    let mut first_tee = tee("tee1");
    let mut first_name = pattern_replace("first-name", "[Aa]ndrew", "Michael")?;
    let mut second_tee = tee("tee2");
    let mut surname = pattern_replace("surname", "(.*)[Dd]inn(.*)", "${1}Smith${2}")?;

    let mut trace1 = FileSink::create(out_dir.join("bar1.txt"))?;
    let mut trace2 = FileSink::create(out_dir.join("bar2.txt"))?;
    let mut writer = FileSink::create(out_dir.join("bar.txt"))?;

    reader.attach(&mut login)?;
    login.attach(&mut first_tee)?;
    first_tee.attach(&mut trace1)?;
    first_tee.attach(&mut first_name)?;
    first_name.attach(&mut second_tee)?;
    second_tee.attach(&mut trace2)?;
    second_tee.attach(&mut surname)?;
    surname.attach(&mut writer)?;

    let report = Pipeline::new()
        .with(reader)
        .with(login)
        .with(first_tee)
        .with(first_name)
        .with(second_tee)
        .with(surname)
        .with(trace1)
        .with(trace2)
        .with(writer)
        .start()?
        .wait()?;

    println!("{}", report.summary());
    if !report.all_completed() {
        eprintln!("{} stage(s) failed", report.failed().len());
    }

    Ok(())
}
