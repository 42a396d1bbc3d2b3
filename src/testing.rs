/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! In-memory stand-ins for sockets, shared by the unit tests.

use std::collections::VecDeque;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;

use crate::CertificateCheck;
use crate::ClientError;
use crate::Connection;
use crate::Split;

/// One write call as the peer saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Written {
    pub encrypted: bool,
    pub text: String,
}

#[derive(Clone, Default)]
pub(crate) struct WireLog(Arc<Mutex<Vec<Written>>>);

impl WireLog {
    pub fn all(&self) -> Vec<Written> {
        self.0.lock().unwrap().clone()
    }

    pub fn texts(&self, encrypted: bool) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|written| written.encrypted == encrypted)
            .map(|written| written.text)
            .collect()
    }

    fn push(&self, encrypted: bool, bytes: &[u8]) {
        self.0.lock().unwrap().push(Written {
            encrypted,
            text: String::from_utf8_lossy(bytes).into_owned(),
        });
    }
}

fn read_chunk(chunks: &mut VecDeque<Vec<u8>>, buf: &mut [u8]) -> usize {
    let Some(mut chunk) = chunks.pop_front() else {
        return 0;
    };
    let n = chunk.len().min(buf.len());
    buf[..n].copy_from_slice(&chunk[..n]);
    if n < chunk.len() {
        chunks.push_front(chunk.split_off(n));
    }
    n
}

fn to_chunks(responses: &[&str]) -> VecDeque<Vec<u8>> {
    responses.iter().map(|text| text.as_bytes().to_vec()).collect()
}

/// A connection which answers every read with the next canned server
/// response, and reports end of stream once they run out.
///
/// The upgrade always succeeds and switches to the second script, so a whole
/// handshake can be played without a network or a TLS peer.
pub(crate) struct ScriptedSocket {
    responses: VecDeque<Vec<u8>>,
    secure_responses: VecDeque<Vec<u8>>,
    encrypted: bool,
    log: WireLog,
}

impl ScriptedSocket {
    pub fn new(plain: &[&str], secure: &[&str]) -> (ScriptedSocket, WireLog) {
        let log = WireLog::default();
        let socket = ScriptedSocket {
            responses: to_chunks(plain),
            secure_responses: to_chunks(secure),
            encrypted: false,
            log: log.clone(),
        };
        (socket, log)
    }
}

impl Read for ScriptedSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(read_chunk(&mut self.responses, buf))
    }
}

impl Write for ScriptedSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.log.push(self.encrypted, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Connection for ScriptedSocket {
    type Secure = ScriptedSocket;

    fn upgrade(self, _domain: &str, _check: CertificateCheck) -> Result<ScriptedSocket, ClientError> {
        Ok(ScriptedSocket {
            responses: self.secure_responses,
            secure_responses: VecDeque::new(),
            encrypted: true,
            log: self.log,
        })
    }
}

pub(crate) struct ScriptedReader(VecDeque<Vec<u8>>);

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(read_chunk(&mut self.0, buf))
    }
}

pub(crate) struct LogWriter {
    encrypted: bool,
    log: WireLog,
}

impl LogWriter {
    pub fn new(log: &WireLog) -> Self {
        LogWriter {
            encrypted: true,
            log: log.clone(),
        }
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.log.push(self.encrypted, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Split for ScriptedSocket {
    type Reader = ScriptedReader;
    type Writer = LogWriter;

    fn split(self) -> std::io::Result<(ScriptedReader, LogWriter)> {
        let writer = LogWriter {
            encrypted: self.encrypted,
            log: self.log,
        };
        Ok((ScriptedReader(self.responses), writer))
    }
}

/// Read end of an in-memory pipe. Blocks until the other end sends bytes,
/// and reports end of stream once the other end is dropped.
pub(crate) struct PipeReader {
    incoming: mpsc::Receiver<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.incoming.recv() {
                Ok(bytes) => self.pending.push_back(bytes),
                Err(_) => return Ok(0),
            }
        }
        Ok(read_chunk(&mut self.pending, buf))
    }
}

pub(crate) fn pipe() -> (mpsc::Sender<Vec<u8>>, PipeReader) {
    let (sender, incoming) = mpsc::channel();
    let reader = PipeReader {
        incoming,
        pending: VecDeque::new(),
    };
    (sender, reader)
}
