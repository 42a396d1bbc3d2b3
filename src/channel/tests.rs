/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::time::Duration;

use super::*;
use crate::Jid;
use crate::ProtocolError;
use crate::error::description;
use crate::testing::LogWriter;
use crate::testing::ScriptedSocket;
use crate::testing::WireLog;
use crate::testing::pipe;

const WAIT: Duration = Duration::from_secs(5);

fn next_stanza(events: &mpsc::Receiver<ChannelEvent>) -> StanzaEvent {
    match events.recv_timeout(WAIT) {
        Ok(ChannelEvent::Stanza(stanza)) => stanza,
        other => panic!("expected a stanza, got {other:?}"),
    }
}

#[test]
fn duties_do_not_block_each_other() {
    let (inbound, source) = pipe();
    let log = WireLog::default();
    let mut channel = MessageChannel::start(FramedReader::new(), source, LogWriter::new(&log));

    // The receiver is blocked on an empty stream, sending still works.
    let id = channel
        .sender()
        .send(&OutboundMessage::new("bob@example.com", "ping"))
        .unwrap();
    assert_eq!(id, "ikschat-1");
    assert_eq!(
        log.texts(true),
        ["<message to=\"bob@example.com\"><body>ping</body><id>ikschat-1</id></message>"]
    );
    assert!(channel.events().try_recv().is_err());

    // Inbound traffic arrives while nothing is being sent.
    inbound
        .send(b"<stream:stream><message from='bob@example.com'><body>po".to_vec())
        .unwrap();
    inbound.send(b"ng</body></message>".to_vec()).unwrap();
    let stanza = next_stanza(channel.events());
    assert_eq!(stanza.local_name, "message");
    assert_eq!(stanza.attribute("from"), Some("bob@example.com"));
    assert_eq!(stanza.character_data, "pong");

    let (mut sender, events) = channel.split();
    assert_eq!(
        sender
            .send(&OutboundMessage::new("bob@example.com", "again"))
            .unwrap(),
        "ikschat-2"
    );
    drop(inbound);
    assert!(matches!(events.recv_timeout(WAIT), Ok(ChannelEvent::Closed)));
    assert!(events.recv_timeout(WAIT).is_err());
}

#[test]
fn channel_over_established_session() {
    let (socket, log) = ScriptedSocket::new(
        &["<stream:stream><stream:features/>", "<proceed/>"],
        &[
            "<stream:stream id='s1'><stream:features/>",
            "<success/>",
            "<iq id='abc123'/>",
            "<iq type='result'/>",
            "<message from='bob@example.com' type='chat'><body>hi there</body></message>",
        ],
    );
    let jid = Jid::from_parts("alice", "example.com").unwrap();
    let mut session = Session::new(socket, jid, "secret");
    session.handshake().unwrap();

    let (mut sender, events) = MessageChannel::open(session).unwrap().split();
    let stanza = next_stanza(&events);
    assert_eq!(stanza.attribute("type"), Some("chat"));
    assert_eq!(stanza.character_data, "hi there");
    assert!(matches!(events.recv_timeout(WAIT), Ok(ChannelEvent::Closed)));

    let sent = sender
        .run([
            OutboundMessage::new("bob@example.com", "one"),
            OutboundMessage::new("bob@example.com", "<two>"),
        ])
        .unwrap();
    assert_eq!(sent, 2);
    let written = log.texts(true);
    assert_eq!(written.len(), 6);
    assert_eq!(
        written[5],
        "<message to=\"bob@example.com\"><body>&lt;two&gt;</body><id>ikschat-2</id></message>"
    );
}

#[test]
fn open_needs_established_session() {
    let (socket, _log) = ScriptedSocket::new(&[], &[]);
    let jid = Jid::from_parts("alice", "example.com").unwrap();
    let session = Session::new(socket, jid, "secret");
    assert!(matches!(
        MessageChannel::open(session),
        Err(ClientError::Protocol(ProtocolError::BadStream(
            description::NOT_ESTABLISHED
        )))
    ));
}

#[test]
fn receive_failure_is_published() {
    let (inbound, source) = pipe();
    let log = WireLog::default();
    let channel = MessageChannel::start(FramedReader::new(), source, LogWriter::new(&log));
    inbound
        .send(b"<stream:stream><message><!-- no comments -->".to_vec())
        .unwrap();
    assert!(matches!(
        channel.events().recv_timeout(WAIT),
        Ok(ChannelEvent::Failed(ClientError::Protocol(
            ProtocolError::BadXml(_, _)
        )))
    ));
    assert!(channel.events().recv_timeout(WAIT).is_err());
}
