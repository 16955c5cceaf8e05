//! In-process fake PCIC device.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sensorprims_chunk::{ChunkHeader, ChunkType};
use sensorprims_frame::{FrameReader, FrameWriter, Ticket};

/// What the fake device does in answer to one command.
pub enum Out {
    /// Reply under the command's ticket.
    Reply(Vec<u8>),
    /// Unsolicited frame under ticket `0000`.
    Async(Vec<u8>),
    Delay(Duration),
    /// Close the connection.
    Close,
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
    /// Serve a single connection.
    pub fn spawn<F>(handler: F) -> Self
    where
        F: FnMut(&str) -> Vec<Out> + Send + 'static,
    {
        Self::spawn_sessions(1, handler)
    }

    /// Serve `sessions` connections one after another.
    pub fn spawn_sessions<F>(sessions: usize, mut handler: F) -> Self
    where
        F: FnMut(&str) -> Vec<Out> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have address");
        let log = Arc::new(Mutex::new(Vec::new()));
        let thread_log = Arc::clone(&log);

        let handle = thread::spawn(move || {
            for _ in 0..sessions {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let reader_stream = stream.try_clone().expect("stream should clone");
                let mut reader = FrameReader::new(reader_stream);
                let mut writer = FrameWriter::new(stream);

                'session: loop {
                    let Ok(frame) = reader.read_frame() else {
                        break;
                    };
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
                            Out::Close => break 'session,
                        };
                        if sent.is_err() {
                            break 'session;
                        }
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

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("log lock should not be poisoned")
            .clone()
    }

    /// Wait for the device thread to finish and return every command it saw.
    pub fn join(mut self) -> Vec<String> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake device thread should not panic");
        }
        self.commands()
    }
}

/// A header-version-3 raw monochrome chunk filled with `fill`.
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
        frame_count: 1,
        status_code: 0,
        timestamp_sec: 0,
        timestamp_nsec: 0,
    };
    let mut out = Vec::new();
    header.write_to(br#"{"src":"fake"}"#, &mut out);
    out.extend(std::iter::repeat(fill).take(pixels));
    out
}

/// `star;<ids>;stop` followed by one chunk per id.
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
