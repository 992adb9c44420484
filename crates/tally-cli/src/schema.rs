//! `tally schema`: inspect the schema of an index file.

use std::path::Path;

use tally_core::Index;

pub fn run(index_path: &Path, full: bool) -> anyhow::Result<()> {
    let index = Index::open(index_path)?;
    let schema = index.schema();

    if full {
        println!("{:<24}VALUE", "COLUMN");
        for column in &schema.columns {
            for value in &column.values {
                println!("{:<24}{value}", column.name);
            }
        }
    } else {
        println!("{:<24}UNIQUE VALUES", "COLUMN");
        for column in &schema.columns {
            println!("{:<24}{}", column.name, column.values.len());
        }
    }

    Ok(())
}
