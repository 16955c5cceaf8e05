use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sensorprims_pcic::ImageStream;

use crate::cmd::image::save_chunks;
use crate::cmd::{StreamArgs, Target};
use crate::exit::{pcic_error, CliError, CliResult, SUCCESS};
use crate::output::{print_chunks, OutputFormat};

/// How long one wait for a result lasts before Ctrl-C is checked again.
const POLL_WAIT: Duration = Duration::from_millis(200);

pub fn run(args: StreamArgs, target: &Target, format: OutputFormat) -> CliResult<i32> {
    let link = target.connect_pcic()?;
    let mut stream = ImageStream::open(link).map_err(|err| pcic_error("enable image output", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        // An idle device is not an error: keep waiting until --count or Ctrl-C.
        let frame = match stream.poll_frame(POLL_WAIT) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => return Err(pcic_error("receive result", err)),
        };

        if let Some(dir) = &args.out {
            save_chunks(dir, &format!("frame-{printed:06}"), &frame.chunks)?;
        }
        print_chunks(&frame.ids.join(","), &frame.chunks, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    tracing::debug!(frames = printed, "stream finished");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
