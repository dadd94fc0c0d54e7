//! Bulk load from, and extract to, a two-column delimited text file.

use std::fs::File;
use std::path::Path;

use log::warn;

use crate::btree::BTree;
use crate::error::Error;

/// Reads `path` as a two-column CSV and inserts every well-formed row.
/// Rows with fewer than two fields, or whose first two fields are not
/// valid signed-decimal integers fitting in `u64`, are skipped with a
/// warning rather than aborting the load.
///
/// Returns the number of rows successfully inserted.
pub fn bulk_load(tree: &mut BTree, path: &Path) -> Result<usize, Error> {
    if !path.exists() {
        return Err(Error::Missing(format!(
            "csv file {} does not exist",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut inserted = 0usize;
    for (line_no, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() < 2 {
            warn!("load: skipping row {} (fewer than two fields)", line_no + 1);
            continue;
        }

        let key = match parse_u64_field(record.get(0).unwrap()) {
            Some(k) => k,
            None => {
                warn!("load: skipping row {} (bad key)", line_no + 1);
                continue;
            }
        };
        let value = match parse_u64_field(record.get(1).unwrap()) {
            Some(v) => v,
            None => {
                warn!("load: skipping row {} (bad value)", line_no + 1);
                continue;
            }
        };

        match tree.insert(key, value) {
            Ok(()) => inserted += 1,
            Err(Error::Duplicate) => {
                warn!("load: skipping row {} (duplicate key {})", line_no + 1, key);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(inserted)
}

/// Parses the broader signed-decimal form but only accepts values that
/// fit in the unsigned 64-bit field.
fn parse_u64_field(field: &str) -> Option<u64> {
    let trimmed = field.trim();
    let signed: i64 = trimmed.parse().ok()?;
    u64::try_from(signed).ok()
}

/// Writes every stored pair, in key order, as a two-column delimited
/// file. Fails with [`Error::Exists`] if `path` already exists.
pub fn extract(tree: &mut BTree, path: &Path) -> Result<(), Error> {
    if path.exists() {
        return Err(Error::Exists);
    }

    let mut pairs = Vec::new();
    tree.traverse(|k, v| pairs.push((k, v)))?;

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);
    for (k, v) in pairs {
        writer.write_record([k.to_string(), v.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}
