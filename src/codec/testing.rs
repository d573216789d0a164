//! Scripted in-memory decoder for unit tests

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::decoder::{DecodeHandle, DecodeLauncher, ProcessControl};
use crate::audio::format::PcmFormat;
use crate::error::SourceError;

/// What a scripted stream does after its finite chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// End of stream
    Eof,
    /// Keep producing chunks until killed
    Endless,
    /// Produce nothing and block until killed
    Stall,
    /// Fail the next read with an I/O error
    Error,
}

#[derive(Debug, Clone)]
pub struct Script {
    /// Byte every sample of this stream is filled with
    pub fill: u8,
    pub chunks: usize,
    pub tail: Tail,
    /// Ignore kill and never report exit
    pub unresponsive: bool,
    pub fail_launch: bool,
}

impl Script {
    pub fn finite(fill: u8, chunks: usize) -> Self {
        Self {
            fill,
            chunks,
            tail: Tail::Eof,
            unresponsive: false,
            fail_launch: false,
        }
    }

    pub fn endless(fill: u8) -> Self {
        Self {
            tail: Tail::Endless,
            ..Self::finite(fill, 0)
        }
    }

    pub fn stalled() -> Self {
        Self {
            tail: Tail::Stall,
            ..Self::finite(0, 0)
        }
    }

    pub fn broken(fill: u8, chunks: usize) -> Self {
        Self {
            tail: Tail::Error,
            ..Self::finite(fill, chunks)
        }
    }

    pub fn unresponsive(mut self) -> Self {
        self.unresponsive = true;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::finite(0, 0)
        }
    }
}

/// Launcher whose streams follow a per-source script
pub struct ScriptedLauncher {
    scripts: HashMap<String, Script>,
    fallback: Script,
    launched: Mutex<Vec<String>>,
    kills: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLauncher {
    /// Sources without a script follow `fallback`
    pub fn new(fallback: Script) -> Self {
        Self {
            scripts: HashMap::new(),
            fallback,
            launched: Mutex::new(Vec::new()),
            kills: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with(mut self, source: &str, script: Script) -> Self {
        self.scripts.insert(source.to_string(), script);
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().clone()
    }

    pub fn kills(&self) -> Vec<String> {
        self.kills.lock().clone()
    }
}

impl DecodeLauncher for ScriptedLauncher {
    fn launch(&self, source: &str, format: &PcmFormat) -> Result<DecodeHandle, SourceError> {
        let script = self.scripts.get(source).unwrap_or(&self.fallback).clone();
        if script.fail_launch {
            return Err(SourceError::Launch {
                target: source.to_string(),
                reason: "scripted failure".into(),
            });
        }
        self.launched.lock().push(source.to_string());

        let killed = Arc::new(AtomicBool::new(false));
        let chunk = Bytes::from(vec![script.fill; format.chunk_size()]);
        Ok(DecodeHandle {
            output: Box::new(ScriptedReader {
                chunk,
                remaining: script.chunks,
                tail: script.tail,
                pending: Vec::new(),
                killed: killed.clone(),
            }),
            control: Box::new(ScriptedControl {
                source: source.to_string(),
                killed,
                unresponsive: script.unresponsive,
                kills: self.kills.clone(),
            }),
        })
    }
}

struct ScriptedReader {
    chunk: Bytes,
    remaining: usize,
    tail: Tail,
    pending: Vec<u8>,
    killed: Arc<AtomicBool>,
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            if self.killed.load(Ordering::SeqCst) {
                return Ok(0);
            }
            if self.remaining > 0 {
                self.remaining -= 1;
                self.pending = self.chunk.to_vec();
            } else {
                match self.tail {
                    Tail::Eof => return Ok(0),
                    Tail::Endless => {
                        thread::sleep(Duration::from_millis(1));
                        self.pending = self.chunk.to_vec();
                    }
                    Tail::Stall => {
                        while !self.killed.load(Ordering::SeqCst) {
                            thread::sleep(Duration::from_millis(2));
                        }
                        return Ok(0);
                    }
                    Tail::Error => {
                        return Err(io::Error::new(io::ErrorKind::BrokenPipe, "decoder pipe broke"));
                    }
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

struct ScriptedControl {
    source: String,
    killed: Arc<AtomicBool>,
    unresponsive: bool,
    kills: Arc<Mutex<Vec<String>>>,
}

impl ProcessControl for ScriptedControl {
    fn kill(&mut self) -> Result<(), SourceError> {
        self.kills.lock().push(self.source.clone());
        if !self.unresponsive {
            self.killed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn try_wait(&mut self) -> Result<bool, SourceError> {
        Ok(!self.unresponsive && self.killed.load(Ordering::SeqCst))
    }
}
