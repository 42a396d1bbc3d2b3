/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::Read;
use std::io::Write;
use std::sync::mpsc;
use std::thread;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ClientError;
use crate::Connection;
use crate::FramedReader;
use crate::Session;
use crate::Split;
use crate::StanzaEvent;
use crate::constants::MESSAGE_ID_PREFIX;
use crate::constants::WIRE_LOG;
use crate::stanza;

/// A chat message waiting to be written to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        OutboundMessage {
            recipient: recipient.into(),
            body: body.into(),
        }
    }
}

/// What the receiver duty publishes to the consumer.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A top level element pushed by the server.
    Stanza(StanzaEvent),
    /// The server ended the stream. Nothing follows this event.
    Closed,
    /// Reading from the stream failed. Nothing follows this event.
    Failed(ClientError),
}

/// Sender duty: owns the write half of the stream and serializes outbound
/// messages onto it in the order they are given.
pub struct MessageSender<W: Write> {
    writer: W,
    next_id: u64,
}

impl<W: Write> MessageSender<W> {
    pub fn new(writer: W) -> Self {
        MessageSender { writer, next_id: 1 }
    }

    /// Writes one message and returns the id it was sent with.
    pub fn send(&mut self, message: &OutboundMessage) -> Result<String, ClientError> {
        let id = format!("{MESSAGE_ID_PREFIX}{}", self.next_id);
        self.next_id += 1;
        let fragment = stanza::message(&message.recipient, &message.body, &id);
        debug!(target: WIRE_LOG, bytes = fragment.as_str(), "Sending bytes");
        self.writer.write_all(fragment.as_bytes())?;
        self.writer.flush()?;
        Ok(id)
    }

    /// Sends everything the producer yields, stopping at the first failure.
    /// Returns the number of messages sent.
    pub fn run<I>(&mut self, producer: I) -> Result<usize, ClientError>
    where
        I: IntoIterator<Item = OutboundMessage>,
    {
        let mut count = 0;
        for message in producer {
            self.send(&message)?;
            count += 1;
        }
        Ok(count)
    }
}

fn receive<R: Read>(mut reader: FramedReader, mut source: R, events: mpsc::Sender<ChannelEvent>) {
    loop {
        let (event, last) = match reader.await_element(&mut source, None) {
            Ok(_) if reader.at_eof() => {
                info!("Stream closed by the server");
                (ChannelEvent::Closed, true)
            }
            Ok(stanza) => (ChannelEvent::Stanza(stanza), false),
            Err(err) => {
                warn!(error = %err, "Receiving failed");
                (ChannelEvent::Failed(err), true)
            }
        };
        if events.send(event).is_err() {
            debug!("Event consumer is gone, receiver stops");
            return;
        }
        if last {
            return;
        }
    }
}

/// The two concurrent duties of an established session.
///
/// Opening the channel splits the encrypted stream. The read half moves into
/// a receiver thread which drains inbound elements and publishes them as
/// [ChannelEvent]s, while the write half stays with the [MessageSender].
/// Neither side waits for the other.
pub struct MessageChannel<W: Write> {
    sender: MessageSender<W>,
    events: mpsc::Receiver<ChannelEvent>,
}

impl<W: Write> MessageChannel<W> {
    pub fn open<C>(session: Session<C>) -> Result<Self, ClientError>
    where
        C: Connection,
        C::Secure: Split<Writer = W>,
    {
        let (reader, secure) = session.into_established()?;
        let (source, writer) = secure.split()?;
        Ok(Self::start(reader, source, writer))
    }

    pub(crate) fn start<R>(reader: FramedReader, source: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
    {
        let (publisher, events) = mpsc::channel();
        thread::spawn(move || receive(reader, source, publisher));
        MessageChannel {
            sender: MessageSender::new(writer),
            events,
        }
    }

    pub fn sender(&mut self) -> &mut MessageSender<W> {
        &mut self.sender
    }

    pub fn events(&self) -> &mpsc::Receiver<ChannelEvent> {
        &self.events
    }

    /// Separates the duties, so the events can be consumed on another
    /// thread.
    pub fn split(self) -> (MessageSender<W>, mpsc::Receiver<ChannelEvent>) {
        (self.sender, self.events)
    }
}

#[cfg(test)]
mod tests;
