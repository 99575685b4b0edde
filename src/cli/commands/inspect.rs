//! Inspect command implementation.

use std::path::Path;

use colored::Colorize;

use crate::config::Settings;
use crate::error::Result;
use crate::sync::{normalize_currency, profile_records, read_records, ColumnProfile, Profile};

/// Execute the inspect command.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not an array of objects.
pub fn execute(file: &Path, clean_currency: bool, settings: &Settings, json: bool) -> Result<()> {
    let mut records = read_records(file)?;
    if clean_currency {
        normalize_currency(&mut records);
    }
    let profile = profile_records(&records, settings.sample_size, settings.text_threshold);

    if json {
        println!("{}", serde_json::to_string(&profile)?);
        return Ok(());
    }

    print_profile(file, &profile);
    Ok(())
}

fn print_profile(file: &Path, profile: &Profile) {
    println!(
        "{} {} ({} records)",
        "File:".bold(),
        file.display(),
        profile.records
    );
    println!();

    if profile.columns.is_empty() {
        println!("No fields found.");
        return;
    }

    let width = profile
        .columns
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(6);

    println!(
        "  {:<width$}  {:<8}  {:>6}  {:>8}  {:>6}  NOTES",
        "COLUMN", "TYPE", "NULLS", "DISTINCT", "DUPES"
    );
    for column in &profile.columns {
        let suggested = profile.suggested_key.as_deref() == Some(column.name.as_str());
        println!(
            "  {:<width$}  {:<8}  {:>6}  {:>8}  {:>6}  {}",
            column.name,
            column.column_type.to_string(),
            column.nulls,
            column.distinct,
            column.duplicates,
            notes(column, suggested)
        );
    }

    println!();
    match &profile.suggested_key {
        Some(key) => println!("Suggested key: {}", key.green().bold()),
        None => println!("{}", "No column is unique on every record.".yellow()),
    }
}

fn notes(column: &ColumnProfile, suggested: bool) -> String {
    if column.structured {
        "nested data, not a key candidate".dimmed().to_string()
    } else if suggested {
        "unique (suggested key)".green().to_string()
    } else if column.key_candidate {
        "unique".green().to_string()
    } else if column.duplicates > 0 {
        format!("{} duplicated", column.duplicates).yellow().to_string()
    } else {
        String::new()
    }
}
