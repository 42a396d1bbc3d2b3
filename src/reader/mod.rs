/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::io::Read;

use tracing::debug;

use crate::ClientError;
use crate::ParseError;
use crate::ProtocolError;
use crate::StreamToken;
use crate::StreamTokenizer;
use crate::TokenHandler;
use crate::constants::STREAM_NAME;
use crate::constants::WIRE_LOG;
use crate::error::description;

const READ_BUFFER_SIZE: usize = 4096;

/// One top level element received from the peer.
///
/// The default value is the empty event returned when the stream ends
/// before an element is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StanzaEvent {
    /// Local name of the element, without the namespace prefix.
    pub local_name: String,
    /// Attributes of the element itself, keyed by local name.
    pub attributes: HashMap<String, String>,
    /// All character data inside the element, in document order.
    pub character_data: String,
    /// Last value of the attribute asked for in the read, if it appeared on
    /// any element seen during the read.
    pub extracted_attribute: Option<String>,
}

impl StanzaEvent {
    pub fn is_empty(&self) -> bool {
        self.local_name.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

enum Token {
    Start(String),
    Attribute(String, String),
    EmptyEnd,
    End(String),
    Text(String),
}

#[derive(Default)]
struct TokenQueue {
    tokens: VecDeque<Token>,
}

impl TokenHandler for TokenQueue {
    fn handle_token(&mut self, token: &StreamToken) -> Result<(), ParseError> {
        let token = match token {
            StreamToken::StartTag(name) => Token::Start(name.to_string()),
            StreamToken::Attribute(name, value) => {
                Token::Attribute(name.to_string(), value.to_string())
            }
            StreamToken::EmptyElementTag => Token::EmptyEnd,
            StreamToken::EndTag(name) => Token::End(name.to_string()),
            StreamToken::CData(text) => Token::Text(text.to_string()),
        };
        self.tokens.push_back(token);
        Ok(())
    }
}

/// State of a single framed read.
struct Frame<'a> {
    match_attribute: Option<&'a str>,
    // Nesting level of the element which ends the read, once seen.
    terminator: Option<usize>,
    event: StanzaEvent,
}

impl<'a> Frame<'a> {
    fn new(match_attribute: Option<&'a str>) -> Self {
        Frame {
            match_attribute,
            terminator: None,
            event: StanzaEvent::default(),
        }
    }
}

/// Reads top level elements one at a time from a never ending XML stream.
///
/// The reader does not own the byte source. Each call to
/// [await_element()](FramedReader::await_element) borrows it, so the same
/// reader can follow a transport through a handshake and later move into a
/// receiver thread together with the read half of the transport. Tokens
/// which arrive after the element that ended a read are kept for the next
/// read.
pub struct FramedReader {
    tokenizer: StreamTokenizer,
    queue: TokenQueue,
    open: Vec<String>,
    buffer: Vec<u8>,
    eof: bool,
}

impl FramedReader {
    pub fn new() -> Self {
        FramedReader {
            tokenizer: StreamTokenizer::new(),
            queue: TokenQueue::default(),
            open: Vec::new(),
            buffer: vec![0; READ_BUFFER_SIZE],
            eof: false,
        }
    }

    /// True after the byte source reported the end of the stream.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Reads until the first element other than the stream root is closed.
    ///
    /// The first non-stream start tag decides the terminator, and the read
    /// ends when that same element (not a nested one with the same name) is
    /// closed. If `match_attribute` is given, the value of every attribute
    /// with that local name is recorded, the last one wins. If the stream
    /// ends before the terminator closes, an empty event is returned.
    pub fn await_element(
        &mut self,
        source: &mut impl Read,
        match_attribute: Option<&str>,
    ) -> Result<StanzaEvent, ClientError> {
        let mut frame = Frame::new(match_attribute);
        loop {
            while let Some(token) = self.queue.tokens.pop_front() {
                if self.apply(&mut frame, token)? {
                    return Ok(frame.event);
                }
            }
            if self.eof {
                return Ok(StanzaEvent::default());
            }
            let nr_read = match source.read(&mut self.buffer) {
                Ok(nr_read) => nr_read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if nr_read == 0 {
                debug!(target: WIRE_LOG, "end of stream");
                self.eof = true;
                return Ok(StanzaEvent::default());
            }
            self.tokenizer
                .parse_bytes(&mut self.queue, &self.buffer[..nr_read])
                .map_err(|err| ProtocolError::from_parse(err, self.tokenizer.location()))?;
        }
    }

    fn apply(&mut self, frame: &mut Frame, token: Token) -> Result<bool, ProtocolError> {
        match token {
            Token::Start(name) => {
                let local = local_name(&name);
                debug!(target: WIRE_LOG, element = local, "start");
                if frame.terminator.is_none() && local != STREAM_NAME {
                    frame.terminator = Some(self.open.len() + 1);
                    frame.event.local_name = local.to_string();
                }
                self.open.push(name);
            }
            Token::Attribute(name, value) => {
                let local = local_name(&name);
                debug!(target: WIRE_LOG, attribute = local, value = value.as_str(), "attribute");
                if frame.match_attribute == Some(local) {
                    frame.event.extracted_attribute = Some(value.clone());
                }
                if frame.terminator == Some(self.open.len()) {
                    frame.event.attributes.insert(local.to_string(), value);
                }
            }
            Token::EmptyEnd => {
                if let Some(name) = self.open.pop() {
                    debug!(target: WIRE_LOG, element = local_name(&name), "end");
                }
                return Ok(frame.terminator == Some(self.open.len() + 1));
            }
            Token::End(name) => {
                if self.open.pop().as_deref() != Some(name.as_str()) {
                    return Err(ProtocolError::BadStream(description::END_TAG_MISMATCH));
                }
                debug!(target: WIRE_LOG, element = local_name(&name), "end");
                return Ok(frame.terminator == Some(self.open.len() + 1));
            }
            Token::Text(text) => {
                debug!(target: WIRE_LOG, text = text.as_str(), "character data");
                if frame.terminator.is_some() {
                    frame.event.character_data.push_str(&text);
                }
            }
        }
        Ok(false)
    }
}

impl Default for FramedReader {
    fn default() -> Self {
        Self::new()
    }
}
