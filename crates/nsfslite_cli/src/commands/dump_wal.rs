//! Dump WAL command implementation.

use super::{hex_encode, require_file};
use nsfslite_core::wal::{WalManager, WalRecord};
use nsfslite_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// WAL record representation for output.
#[derive(Debug, Serialize)]
pub struct WalRecordInfo {
    /// Offset in the WAL file.
    pub offset: u64,
    /// Record type.
    pub record_type: String,
    /// Transaction ID.
    pub txid: u64,
    /// Variable ID (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var_id: Option<u64>,
    /// Variable name (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stride or offset description (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Sequence number (commit only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Payload size in bytes (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
    /// First payload bytes, hex-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Dump output: readable records plus the error that ended the log, if any.
#[derive(Debug, Serialize)]
pub struct WalDump {
    /// Decoded records.
    pub records: Vec<WalRecordInfo>,
    /// Corruption that stopped the dump.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_by: Option<String>,
}

const PREVIEW_BYTES: usize = 16;

/// Runs the dump-wal command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    require_file(path, "WAL")?;
    let wal = WalManager::new(Box::new(FileBackend::open_existing(path)?), false);
    let dump = dump(&wal, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        _ => {
            print_text_output(&dump);
        }
    }

    Ok(())
}

/// Decodes up to `limit` records.
pub fn dump(wal: &WalManager, limit: Option<usize>) -> Result<WalDump, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    let mut stopped_by = None;

    for result in wal.iter()?.take(max_records) {
        match result {
            Ok((offset, record)) => records.push(describe(offset, &record)),
            Err(e) => {
                stopped_by = Some(e.to_string());
                break;
            }
        }
    }

    Ok(WalDump {
        records,
        stopped_by,
    })
}

fn describe(offset: u64, record: &WalRecord) -> WalRecordInfo {
    let mut info = WalRecordInfo {
        offset,
        record_type: record.record_type().name().to_uppercase(),
        txid: record.txid().as_u64(),
        var_id: None,
        name: None,
        range: None,
        sequence: None,
        payload_size: None,
        preview: None,
    };

    match record {
        WalRecord::Begin { .. } => {}
        WalRecord::Create { var_id, name, .. } => {
            info.var_id = Some(var_id.as_u64());
            info.name = Some(name.clone());
        }
        WalRecord::Delete { name, .. } => {
            info.name = Some(name.clone());
        }
        WalRecord::Insert {
            var_id,
            offset,
            data,
            ..
        } => {
            set_payload(&mut info, data);
            info.var_id = Some(var_id.as_u64());
            info.range = Some(format!("@{offset}"));
        }
        WalRecord::Write {
            var_id,
            start,
            step,
            nelems,
            elem_size,
            data,
            ..
        } => {
            set_payload(&mut info, data);
            info.var_id = Some(var_id.as_u64());
            info.range = Some(stride_label(*start, *step, *nelems, *elem_size));
        }
        WalRecord::Remove {
            var_id,
            start,
            step,
            nelems,
            elem_size,
            ..
        } => {
            info.var_id = Some(var_id.as_u64());
            info.range = Some(stride_label(*start, *step, *nelems, *elem_size));
        }
        WalRecord::Commit { sequence, .. } => {
            info.sequence = Some(sequence.as_u64());
        }
    }

    info
}

/// `start/step x nelems`, with `*size` for elements wider than a byte.
fn stride_label(start: u64, step: u64, nelems: u64, elem_size: u64) -> String {
    if elem_size == 1 {
        format!("{start}/{step}x{nelems}")
    } else {
        format!("{start}/{step}x{nelems}*{elem_size}")
    }
}

fn set_payload(info: &mut WalRecordInfo, data: &[u8]) {
    info.payload_size = Some(data.len());
    info.preview = Some(hex_encode(&data[..PREVIEW_BYTES.min(data.len())]));
}

fn print_text_output(dump: &WalDump) {
    println!("WAL Records ({} total)", dump.records.len());
    println!("================");
    println!();

    for record in &dump.records {
        print!("[{:08}] {:8} txid={}", record.offset, record.record_type, record.txid);

        if let Some(seq) = record.sequence {
            print!(" seq={}", seq);
        }
        if let Some(id) = record.var_id {
            print!(" var={}", id);
        }
        if let Some(ref name) = record.name {
            print!(" name={:?}", name);
        }
        if let Some(ref range) = record.range {
            print!(" range={}", range);
        }
        if let Some(size) = record.payload_size {
            print!(" payload={} bytes", size);
        }

        println!();
    }

    if let Some(ref reason) = dump.stopped_by {
        println!();
        println!("stopped: {reason}");
    }
}
