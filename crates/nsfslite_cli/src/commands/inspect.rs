//! Inspect command implementation.

use super::{hex_encode, require_file};
use nsfslite_core::storage::{FileHeader, StorageFile, DATA_START, HEADER_SLOT_SIZE};
use nsfslite_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Storage file path.
    pub path: String,
    /// Storage file size in bytes.
    pub file_size: u64,
    /// Both header slots, current one flagged.
    pub slots: Vec<SlotInfo>,
    /// Sequence of the last applied commit.
    pub applied_seq: u64,
    /// Live variables ordered by ID.
    pub variables: Vec<VariableInfo>,
    /// Free extents.
    pub free: Vec<ExtentInfo>,
    /// Total free bytes.
    pub free_bytes: u64,
}

/// One header slot.
#[derive(Debug, Serialize)]
pub struct SlotInfo {
    /// Slot index (0 or 1).
    pub slot: usize,
    /// Whether this slot holds the header in use.
    pub current: bool,
    /// Decoded header, if the slot is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    /// Applied sequence recorded in the slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_seq: Option<u64>,
    /// Catalog extent recorded in the slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<ExtentInfo>,
    /// Why the slot is invalid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One variable.
#[derive(Debug, Serialize)]
pub struct VariableInfo {
    /// Variable ID.
    pub id: u64,
    /// Variable name.
    pub name: String,
    /// Length in bytes.
    pub length: u64,
    /// Extent holding the bytes.
    pub extent: ExtentInfo,
}

/// A byte range in the storage file.
#[derive(Debug, Serialize)]
pub struct ExtentInfo {
    /// Start offset.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

impl From<nsfslite_core::storage::Extent> for ExtentInfo {
    fn from(extent: nsfslite_core::storage::Extent) -> Self {
        Self {
            offset: extent.offset,
            len: extent.len,
        }
    }
}

/// Runs the inspect command.
///
/// Reads the storage file without replaying the WAL or writing anything.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_file(path, "storage file")?;
    let file = StorageFile::new(Box::new(FileBackend::open_existing(path)?));
    let result = inspect(path, &file)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects inspection data from an opened storage file.
pub fn inspect(path: &Path, file: &StorageFile) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let snapshot = file.load()?;
    let raw = file.read_at(0, DATA_START)?;

    let slots = raw
        .chunks(HEADER_SLOT_SIZE)
        .enumerate()
        .map(|(slot, bytes)| match FileHeader::decode(bytes) {
            Ok(header) => SlotInfo {
                slot,
                current: header == snapshot.header,
                generation: Some(header.generation),
                applied_seq: Some(header.applied_seq.as_u64()),
                catalog: Some(header.catalog.into()),
                error: None,
            },
            Err(e) => SlotInfo {
                slot,
                current: false,
                generation: None,
                applied_seq: None,
                catalog: None,
                error: Some(if bytes.iter().all(|b| *b == 0) {
                    "empty".to_string()
                } else {
                    format!("{e} (starts {})", hex_encode(&bytes[..8]))
                }),
            },
        })
        .collect();

    let variables = snapshot
        .directory
        .list()
        .map(|entry| VariableInfo {
            id: entry.id.as_u64(),
            name: entry.name.clone(),
            length: entry.len(),
            extent: entry.extent.into(),
        })
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: file.size()?,
        slots,
        applied_seq: snapshot.header.applied_seq.as_u64(),
        variables,
        free: snapshot.free.iter().map(ExtentInfo::from).collect(),
        free_bytes: snapshot.free.total_free(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("nsfslite Store Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!("File size: {} bytes", result.file_size);
    println!("Applied sequence: {}", result.applied_seq);
    println!();

    println!("Header slots:");
    for slot in &result.slots {
        let marker = if slot.current { "*" } else { " " };
        match (&slot.generation, &slot.error) {
            (Some(generation), _) => {
                let seq = slot.applied_seq.unwrap_or_default();
                let (offset, len) = slot
                    .catalog
                    .as_ref()
                    .map_or((0, 0), |c| (c.offset, c.len));
                println!(
                    " {marker}[{}] generation={generation} seq={seq} catalog={offset}+{len}",
                    slot.slot
                );
            }
            (None, Some(error)) => println!(" {marker}[{}] invalid: {error}", slot.slot),
            (None, None) => println!(" {marker}[{}] invalid", slot.slot),
        }
    }
    println!();

    println!("Variables ({}):", result.variables.len());
    for var in &result.variables {
        println!(
            "  {:>6}  {:<24} {:>10} bytes  @{}",
            var.id, var.name, var.length, var.extent.offset
        );
    }
    println!();

    println!(
        "Free extents: {} ({} bytes)",
        result.free.len(),
        result.free_bytes
    );
    for extent in &result.free {
        println!("  {}+{}", extent.offset, extent.len);
    }
}
