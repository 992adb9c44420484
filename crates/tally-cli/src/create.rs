//! `tally create`: build an index from a CSV file.

use std::path::Path;

use anyhow::Context;
use tally_core::{ExternalWriter, IndexWriter};
use tracing::info;

pub fn run(
    input: &Path,
    output: &Path,
    external: bool,
    scratch: Option<&Path>,
) -> anyhow::Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("failed to open input file {}", input.display()))?;

    let header: Vec<String> = reader
        .headers()
        .context("failed to read input file header")?
        .iter()
        .map(normalize_header)
        .collect();

    if external {
        // Keeps the default scratch directory alive until flush.
        let _temp_dir;
        let scratch_path = match scratch {
            Some(path) => path.to_path_buf(),
            None => {
                let dir = tempfile::tempdir().context("failed to create temporary directory")?;
                let path = dir.path().join("scratch.tally");
                _temp_dir = Some(dir);
                path
            }
        };

        let mut writer = ExternalWriter::create(output, &scratch_path)?;
        for record in reader.records() {
            let record = record.context("failed to read record")?;
            writer.add_row(header.iter().map(String::as_str).zip(record.iter()))?;
        }
        let rows = writer.row_count();
        writer.flush()?;
        info!(rows, output = %output.display(), "index created (external build)");
    } else {
        let mut writer = IndexWriter::new();
        for record in reader.records() {
            let record = record.context("failed to read record")?;
            writer.add_row(header.iter().map(String::as_str).zip(record.iter()));
        }
        let rows = writer.row_count();
        writer.flush(output)?;
        info!(rows, output = %output.display(), "index created");
    }

    Ok(())
}

/// Normalizes a CSV header into a column name: lowercase, any
/// non-alphabetic character becomes `_`.
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() { c } else { '_' })
        .collect()
}
