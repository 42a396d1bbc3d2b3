/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

use crate::BadJid;
use crate::ConfigError;
use crate::Location;
use crate::ParseError;

/// Every failure of the client. None of them is recoverable, the session is
/// over once one of these is returned.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration file is missing, unparsable or has bad values.
    Config(ConfigError),
    /// No connectable server could be found for the domain.
    Discovery(String),
    /// Dial, read, write or TLS failure.
    Connection(std::io::Error),
    /// The peer sent something the client cannot work with.
    Protocol(ProtocolError),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Config(err) => write!(f, "configuration error: {err}"),
            ClientError::Discovery(msg) => write!(f, "service discovery failed: {msg}"),
            ClientError::Connection(err) => write!(f, "connection error: {err}"),
            ClientError::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClientError::Config(err) => Some(err),
            ClientError::Discovery(_) => None,
            ClientError::Connection(err) => Some(err),
            ClientError::Protocol(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::Config(err)
    }
}

impl From<BadJid> for ClientError {
    fn from(err: BadJid) -> Self {
        ClientError::Config(ConfigError::BadJid(err))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Connection(err)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        ClientError::Protocol(err)
    }
}

impl From<rustls::Error> for ClientError {
    fn from(err: rustls::Error) -> Self {
        ClientError::Connection(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ProtocolError {
    NoMemory,
    BadXml(&'static str, Location),
    BadStream(&'static str),
    Rejected(&'static str),
}

impl ProtocolError {
    pub(crate) fn from_parse(err: ParseError, location: Location) -> Self {
        match err {
            ParseError::NoMemory => ProtocolError::NoMemory,
            ParseError::BadXml(msg) => ProtocolError::BadXml(msg, location),
        }
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::NoMemory => write!(f, "not enough memory"),
            ProtocolError::BadXml(msg, location) => {
                write!(f, "invalid XML syntax at {location}: {msg}")
            }
            ProtocolError::BadStream(msg) => write!(f, "invalid stream protocol: {msg}"),
            ProtocolError::Rejected(msg) => write!(f, "server rejected the request: {msg}"),
        }
    }
}

impl Error for ProtocolError {}

pub(crate) mod description {
    pub(crate) const END_TAG_MISMATCH: &str = "end tag does not match the open element";
    pub(crate) const NOT_PLAINTEXT: &str = "raw reads are only possible before STARTTLS";
    pub(crate) const NOT_ENCRYPTED: &str = "transport is not encrypted";
    pub(crate) const ALREADY_ENCRYPTED: &str = "transport is already encrypted";
    pub(crate) const TRANSPORT_UNAVAILABLE: &str = "transport was lost during the TLS upgrade";
    pub(crate) const NO_TRANSITION: &str = "handshake has no transition from this state";
    pub(crate) const NOT_ESTABLISHED: &str = "session is not established";
    pub(crate) const TLS_REFUSED: &str = "STARTTLS was refused";
    pub(crate) const TLS_NO_PROCEED: &str = "STARTTLS acknowledgement has no proceed";
    pub(crate) const AUTH_FAILED: &str = "SASL PLAIN authentication failed";
    pub(crate) const BIND_FAILED: &str = "resource binding failed";
}
