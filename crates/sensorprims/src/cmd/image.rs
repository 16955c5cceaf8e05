use std::fs;
use std::path::{Path, PathBuf};

use sensorprims_chunk::{ChunkPayload, ResultChunk};

use crate::cmd::{ImageArgs, Target};
use crate::exit::{io_error, pcic_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_chunks, OutputFormat};

pub fn run(args: ImageArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let mut link = target.connect_pcic()?;
    let chunks = link
        .request_last_image(args.id)
        .map_err(|err| pcic_error("last image", err))?;

    if let Some(dir) = &args.out {
        for path in save_chunks(dir, &format!("image-{:02}", args.id), &chunks)? {
            tracing::info!(path = %path.display(), "saved");
        }
    }
    print_chunks(&format!("image {:02}", args.id), &chunks, format);
    Ok(SUCCESS)
}

/// Write each chunk to `dir`: JPEG as `.jpg`, 8-bit grey as `.png`, the rest as `.bin`.
pub fn save_chunks(dir: &Path, prefix: &str, chunks: &[ResultChunk]) -> CliResult<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|err| io_error("create output directory", err))?;

    let mut written = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let path = match &chunk.payload {
            ChunkPayload::Jpeg { encoded, .. } => {
                let path = dir.join(format!("{prefix}-{i}.jpg"));
                fs::write(&path, encoded).map_err(|err| io_error("write image", err))?;
                path
            }
            ChunkPayload::Monochrome(image) => {
                let path = dir.join(format!("{prefix}-{i}.png"));
                image.save(&path).map_err(|err| {
                    CliError::new(DATA_INVALID, format!("write image: {err}"))
                })?;
                path
            }
            ChunkPayload::Opaque(bytes) => {
                let path = dir.join(format!("{prefix}-{i}.bin"));
                fs::write(&path, bytes).map_err(|err| io_error("write chunk", err))?;
                path
            }
        };
        written.push(path);
    }
    Ok(written)
}
