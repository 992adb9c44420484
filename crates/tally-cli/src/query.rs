//! `tally query`: run a query against an index file.

use std::path::Path;

use anyhow::Context;
use tally_core::{Index, IndexConfig, Parser, QueryResult};

use crate::FormatArg;

#[allow(clippy::fn_params_excessive_bools)]
pub fn run(
    index_path: &Path,
    query_text: &str,
    args: &[String],
    preload: bool,
    cache_size: Option<u64>,
    config_file: Option<&Path>,
    format: FormatArg,
) -> anyhow::Result<()> {
    let mut config = IndexConfig::load(config_file)?;
    if preload {
        config.preload = true;
    }
    if let Some(size) = cache_size {
        config.cache_size_bytes = size;
    }

    let query = Parser::parse(query_text)
        .with_context(|| format!("failed to parse query {query_text:?}"))?;
    let query = query.bind(args)?;

    let index = Index::open_with(index_path, config.to_options())?;
    let result = index.execute(&query)?;

    match format {
        FormatArg::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        FormatArg::Table => print_table(&result),
    }

    Ok(())
}

fn print_table(result: &QueryResult) {
    println!("TOTAL\t{}", result.count);
    for group in &result.groups {
        let fields: Vec<String> = group
            .fields
            .iter()
            .map(|field| format!("{}={}", field.column, field.value))
            .collect();
        println!("{}\t{}", fields.join(", "), group.count);
    }
}
