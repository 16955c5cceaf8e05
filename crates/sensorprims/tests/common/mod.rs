//! Fake PCIC device for driving the CLI binary.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sensorprims_chunk::{ChunkHeader, ChunkType};
use sensorprims_frame::{FrameReader, FrameWriter, Ticket};

pub enum Out {
    Reply(Vec<u8>),
    Async(Vec<u8>),
    Delay(Duration),
}

pub fn reply(body: &str) -> Vec<Out> {
    vec![Out::Reply(body.as_bytes().to_vec())]
}

pub struct FakeDevice {
    addr: SocketAddr,
    log: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDevice {
    /// Serve one connection, answering each command with `handler`.
    pub fn spawn<F>(mut handler: F) -> Self
    where
        F: FnMut(&str) -> Vec<Out> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have address");
        let log = Arc::new(Mutex::new(Vec::new()));
        let thread_log = Arc::clone(&log);

        let handle = thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
            let mut writer = FrameWriter::new(stream);

            'session: while let Ok(frame) = reader.read_frame() {
                let command = String::from_utf8_lossy(&frame.body).into_owned();
                thread_log
                    .lock()
                    .expect("log lock should not be poisoned")
                    .push(command.clone());

                for out in handler(&command) {
                    let sent = match out {
                        Out::Reply(body) => writer.send(frame.ticket, &body),
                        Out::Async(body) => writer.send(Ticket::ASYNC, &body),
                        Out::Delay(delay) => {
                            thread::sleep(delay);
                            Ok(())
                        }
                    };
                    if sent.is_err() {
                        break 'session;
                    }
                }
            }
        });

        Self {
            addr,
            log,
            handle: Some(handle),
        }
    }

    pub fn port(&self) -> String {
        self.addr.port().to_string()
    }

    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake device thread should not panic");
        }
        self.log
            .lock()
            .expect("log lock should not be poisoned")
            .clone()
    }
}

pub fn mono_chunk(width: u32, height: u32, fill: u8) -> Vec<u8> {
    let pixels = (width * height) as usize;
    let header = ChunkHeader {
        chunk_type: ChunkType::Monochrome8,
        chunk_size: 0x40 + pixels as u32,
        header_size: 0x40,
        header_version: 3,
        image_width: width,
        image_height: height,
        pixel_format: 0,
        timestamp_us: 0,
        frame_count: 7,
        status_code: 0,
        timestamp_sec: 0,
        timestamp_nsec: 0,
    };
    let mut out = Vec::new();
    header.write_to(b"{}", &mut out);
    out.extend(std::iter::repeat(fill).take(pixels));
    out
}

pub fn image_result(ids: &[u8]) -> Vec<u8> {
    let mut out = b"star;".to_vec();
    for id in ids {
        out.extend_from_slice(format!("{id};").as_bytes());
    }
    out.extend_from_slice(b"stop");
    for id in ids {
        out.extend(mono_chunk(4, 2, *id));
    }
    out
}

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sensorprims-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}
