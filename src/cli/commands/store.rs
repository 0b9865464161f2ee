//! `evalgrid store` subcommands

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cli::args::StoreCommands;
use crate::store::{ElementType, FileBackend, GroupedColumnStore, NumericDtype, StoreBuilder};
use crate::table::csv::read_csv;

pub async fn run_store_command(command: StoreCommands) -> Result<()> {
    match command {
        StoreCommands::Build {
            input,
            output,
            group_key,
            orderby,
            datetime_columns,
            numeric_dtype,
        } => {
            let dtype: NumericDtype = numeric_dtype.parse()?;
            build(&input, &output, &group_key, orderby.as_deref(), &datetime_columns, dtype).await
        }
        StoreCommands::Inspect { store } => inspect(&store).await,
    }
}

async fn build(
    input: &Path,
    output: &Path,
    group_key: &str,
    orderby: Option<&str>,
    datetime_columns: &[String],
    dtype: NumericDtype,
) -> Result<()> {
    let table = read_csv(input, datetime_columns)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    debug!(
        "Read {} rows and {} columns from {}",
        table.num_rows(),
        table.num_columns(),
        input.display()
    );

    let backend = FileBackend::create(output)
        .await
        .with_context(|| format!("Failed to create store directory {}", output.display()))?;
    let store = StoreBuilder::new(Arc::new(backend))
        .numeric_dtype(dtype)
        .build(&table, group_key, orderby)
        .await
        .context("Failed to build store")?;

    println!(
        "Built store at {} with {} groups from {} rows",
        output.display(),
        store.group_keys().len(),
        table.num_rows()
    );
    Ok(())
}

async fn open(dir: &Path) -> Result<GroupedColumnStore> {
    let backend = FileBackend::open(dir)
        .await
        .with_context(|| format!("No store at {}", dir.display()))?;
    GroupedColumnStore::open(Arc::new(backend))
        .await
        .with_context(|| format!("Failed to open store at {}", dir.display()))
}

async fn inspect(dir: &Path) -> Result<()> {
    let store = open(dir).await?;
    let metadata = store.metadata();

    println!(
        "Store {} (format v{}, {} groups)",
        dir.display(),
        metadata.format_version,
        metadata.group_keys.len()
    );
    for key in &metadata.group_keys {
        let group = metadata.group(key)?;
        println!("\n{}: {} rows", key, group.row_count);
        println!("  numeric:  {}", group.numeric_keys.join(", "));
        if !group.missing_keys.datetime_types.is_empty() {
            println!("  datetime: {}", group.missing_keys.datetime_types.join(", "));
        }
        if !group.missing_keys.str_types.is_empty() {
            println!("  text:     {}", group.missing_keys.str_types.join(", "));
        }
        println!(
            "  orderby:  {}",
            group.orderby_key.as_deref().unwrap_or("(storage order)")
        );
        for (name, array) in &group.arrays {
            println!(
                "    {:<16} {:<12} {:?} {}",
                name,
                element_name(&array.element_type),
                array.shape,
                array.location
            );
        }
    }
    Ok(())
}

fn element_name(element: &ElementType) -> String {
    match element {
        ElementType::Float64 => "float64".to_string(),
        ElementType::Float32 => "float32".to_string(),
        ElementType::Int64 => "int64".to_string(),
        ElementType::FixedBytes { width } => format!("bytes[{}]", width),
    }
}
