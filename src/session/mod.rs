/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;
use std::io::Write;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::CertificateCheck;
use crate::ClientError;
use crate::Connection;
use crate::FramedReader;
use crate::Jid;
use crate::ProtocolError;
use crate::StanzaEvent;
use crate::Transport;
use crate::constants::FAILURE_NAME;
use crate::constants::FALLBACK_BIND_ID;
use crate::constants::IQ_NAME;
use crate::constants::PROCEED_NAME;
use crate::constants::STARTTLS_ACK_SIZE;
use crate::constants::WIRE_LOG;
use crate::error::description;
use crate::stanza;

/// Steps of the session bring-up, in the order they are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connected,
    PlainStreamOpened,
    TlsRequested,
    TlsEstablished,
    SecureStreamOpened,
    Authenticating,
    StreamReopened,
    ResourceBinding,
    Established,
    Aborted,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Established | HandshakeState::Aborted)
    }
}

impl Display for HandshakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandshakeState::Connected => "connected",
            HandshakeState::PlainStreamOpened => "stream opened (plain)",
            HandshakeState::TlsRequested => "TLS requested",
            HandshakeState::TlsEstablished => "TLS established",
            HandshakeState::SecureStreamOpened => "stream opened (encrypted)",
            HandshakeState::Authenticating => "authenticating",
            HandshakeState::StreamReopened => "stream reopened",
            HandshakeState::ResourceBinding => "resource binding",
            HandshakeState::Established => "established",
            HandshakeState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One connection attempt, from the plain socket to a bound session.
///
/// The handshake is driven by [step()](Session::step), which performs exactly
/// one transition: write the fragment of the current state, then consume the
/// server's answer. Any error moves the session to
/// [Aborted](HandshakeState::Aborted) and there is no way back.
///
/// ```no_run
/// use ikschat::{Jid, Session, connect};
///
/// # fn main() -> Result<(), ikschat::ClientError> {
/// let jid = Jid::from_parts("alice", "example.com")?;
/// let mut session = Session::new(connect("example.com", 5222)?, jid, "secret");
/// session.handshake()?;
/// println!("bound as {:?}", session.bound_jid());
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connection> {
    transport: Transport<C>,
    reader: FramedReader,
    jid: Jid,
    password: String,
    certificate_check: CertificateCheck,
    stream_id: Option<String>,
    bound_jid: Option<Jid>,
    state: HandshakeState,
}

impl<C: Connection> Session<C> {
    pub fn new(connection: C, jid: Jid, password: &str) -> Self {
        Session {
            transport: Transport::new(connection),
            reader: FramedReader::new(),
            jid,
            password: password.to_string(),
            certificate_check: CertificateCheck::default(),
            stream_id: None,
            bound_jid: None,
            state: HandshakeState::Connected,
        }
    }

    pub fn with_certificate_check(mut self, check: CertificateCheck) -> Self {
        self.certificate_check = check;
        self
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn jid(&self) -> &Jid {
        &self.jid
    }

    /// Stream id extracted after the post-authentication reopen.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// The full JID assigned by the server, if the bind result carried one.
    pub fn bound_jid(&self) -> Option<&Jid> {
        self.bound_jid.as_ref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.transport.is_encrypted()
    }

    /// Runs the steps until the session is established.
    pub fn handshake(&mut self) -> Result<(), ClientError> {
        while self.state != HandshakeState::Established {
            self.step()?;
        }
        Ok(())
    }

    /// Performs the transition out of the current state.
    pub fn step(&mut self) -> Result<HandshakeState, ClientError> {
        if self.state.is_terminal() {
            return Err(ProtocolError::BadStream(description::NO_TRANSITION).into());
        }
        match self.transition() {
            Ok(next) => {
                info!(from = %self.state, to = %next, "Handshake step");
                self.state = next;
                Ok(next)
            }
            Err(err) => {
                warn!(state = %self.state, error = %err, "Handshake aborted");
                self.state = HandshakeState::Aborted;
                Err(err)
            }
        }
    }

    /// Hands the reader and the encrypted stream over to the message
    /// channel.
    pub(crate) fn into_established(self) -> Result<(FramedReader, C::Secure), ClientError> {
        if self.state != HandshakeState::Established {
            return Err(ProtocolError::BadStream(description::NOT_ESTABLISHED).into());
        }
        Ok((self.reader, self.transport.into_secure()?))
    }

    fn transition(&mut self) -> Result<HandshakeState, ClientError> {
        use HandshakeState::*;

        match self.state {
            Connected => {
                self.open_stream()?;
                Ok(PlainStreamOpened)
            }
            PlainStreamOpened => {
                self.send(&stanza::starttls())?;
                self.await_tls_ack()?;
                Ok(TlsRequested)
            }
            TlsRequested => {
                self.transport
                    .upgrade(self.jid.domainpart(), self.certificate_check)?;
                // The old tokenizer state belongs to the plaintext stream.
                self.reader = FramedReader::new();
                Ok(TlsEstablished)
            }
            TlsEstablished => {
                self.open_stream()?;
                Ok(SecureStreamOpened)
            }
            SecureStreamOpened => {
                let user = self.jid.localpart().unwrap_or_default();
                self.send(&stanza::sasl_plain_auth(user, &self.password))?;
                let reply = self.await_element(None)?;
                if reply.local_name == FAILURE_NAME {
                    return Err(ProtocolError::Rejected(description::AUTH_FAILED).into());
                }
                Ok(Authenticating)
            }
            Authenticating => {
                let reply = self.open_stream_with(Some("id"))?;
                self.stream_id = reply.extracted_attribute;
                info!(stream_id = self.stream_id.as_deref(), "Stream reopened");
                Ok(StreamReopened)
            }
            StreamReopened => {
                let id = self.stream_id.as_deref().unwrap_or(FALLBACK_BIND_ID);
                self.send(&stanza::bind_request(id))?;
                let reply = self.await_element(None)?;
                self.check_bind_result(&reply)?;
                Ok(ResourceBinding)
            }
            ResourceBinding => Ok(Established),
            Established | Aborted => {
                Err(ProtocolError::BadStream(description::NO_TRANSITION).into())
            }
        }
    }

    fn send(&mut self, fragment: &str) -> Result<(), ClientError> {
        debug!(target: WIRE_LOG, bytes = fragment, "Sending bytes");
        self.transport.write_all(fragment.as_bytes())?;
        self.transport.flush()?;
        Ok(())
    }

    fn await_element(&mut self, match_attribute: Option<&str>) -> Result<StanzaEvent, ClientError> {
        self.reader.await_element(&mut self.transport, match_attribute)
    }

    fn open_stream(&mut self) -> Result<StanzaEvent, ClientError> {
        self.open_stream_with(None)
    }

    fn open_stream_with(&mut self, match_attribute: Option<&str>) -> Result<StanzaEvent, ClientError> {
        self.send(&stanza::stream_header(&self.jid))?;
        self.await_element(match_attribute)
    }

    fn await_tls_ack(&mut self) -> Result<(), ClientError> {
        let mut ack = [0; STARTTLS_ACK_SIZE];
        let mut len = 0;
        // The reply may arrive in pieces, it is complete at its first '>'.
        while len < ack.len() && !ack[..len].contains(&b'>') {
            let nr_read = self.transport.read_raw(&mut ack[len..])?;
            if nr_read == 0 {
                break;
            }
            len += nr_read;
        }
        let ack = String::from_utf8_lossy(&ack[..len]);
        debug!(target: WIRE_LOG, bytes = %ack, "STARTTLS acknowledgement");
        if ack.contains(PROCEED_NAME) {
            Ok(())
        } else if ack.contains(FAILURE_NAME) {
            Err(ProtocolError::Rejected(description::TLS_REFUSED).into())
        } else {
            Err(ProtocolError::BadStream(description::TLS_NO_PROCEED).into())
        }
    }

    fn check_bind_result(&mut self, reply: &StanzaEvent) -> Result<(), ClientError> {
        if reply.local_name == IQ_NAME && reply.attribute("type") == Some("error") {
            return Err(ProtocolError::Rejected(description::BIND_FAILED).into());
        }
        let text = reply.character_data.trim();
        if text.is_empty() {
            return Ok(());
        }
        match Jid::new(text) {
            Ok(jid) => {
                info!(jid = %jid, "Resource bound");
                self.bound_jid = Some(jid);
            }
            Err(err) => warn!(jid = text, error = %err, "Ignoring unusable bound JID"),
        }
        Ok(())
    }
}
