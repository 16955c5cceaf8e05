use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sensorprims_chunk::{ChunkPayload, ResultChunk};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

/// Aligned `label: value` lines.
pub fn print_pairs(title: &str, pairs: &[(&str, String)]) {
    let width = pairs.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    println!("{title}:");
    for (label, value) in pairs {
        println!("  {:<width$} {value}", format!("{label}:"), width = width);
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Text of a result body, or a size marker for binary data.
pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[derive(Serialize)]
pub struct ChunkSummary {
    pub chunk_type: u32,
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub payload_size: usize,
    pub metadata: Option<serde_json::Value>,
}

impl ChunkSummary {
    pub fn new(chunk: &ResultChunk) -> Self {
        let kind = match &chunk.payload {
            ChunkPayload::Jpeg { .. } => "jpeg",
            ChunkPayload::Monochrome(_) => "mono8",
            ChunkPayload::Opaque(_) => "opaque",
        };
        Self {
            chunk_type: chunk.header.chunk_type.as_raw(),
            kind: kind.to_string(),
            width: chunk.header.image_width,
            height: chunk.header.image_height,
            frame_count: chunk.header.frame_count,
            payload_size: chunk.payload_bytes().len(),
            metadata: chunk.metadata().ok().flatten(),
        }
    }

    pub fn row(&self) -> Vec<String> {
        vec![
            self.chunk_type.to_string(),
            self.kind.clone(),
            format!("{}x{}", self.width, self.height),
            self.frame_count.to_string(),
            self.payload_size.to_string(),
        ]
    }
}

pub const CHUNK_HEADER: [&str; 5] = ["TYPE", "KIND", "SIZE", "FRAME", "BYTES"];

pub fn print_chunks(label: &str, chunks: &[ResultChunk], format: OutputFormat) {
    let summaries: Vec<ChunkSummary> = chunks.iter().map(ChunkSummary::new).collect();
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "source": label,
            "chunks": summaries,
        })),
        OutputFormat::Table => {
            print_table(&CHUNK_HEADER, summaries.iter().map(ChunkSummary::row).collect())
        }
        OutputFormat::Pretty => {
            for s in &summaries {
                println!(
                    "{label}: type={} kind={} size={}x{} frame={} bytes={}",
                    s.chunk_type, s.kind, s.width, s.height, s.frame_count, s.payload_size
                );
            }
        }
        OutputFormat::Raw => {
            for chunk in chunks {
                print_raw(chunk.payload_bytes());
            }
        }
    }
}
