/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod tls;

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;

use tracing::info;

use crate::ClientError;
use crate::ProtocolError;
use crate::error::description;

pub use tls::TlsReader;
pub use tls::TlsStream;
pub use tls::TlsWriter;

/// How the server certificate is checked during the TLS upgrade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertificateCheck {
    /// Accept any certificate. This is a known weakness of the default
    /// posture: the link is encrypted but the server is not authenticated.
    #[default]
    Skip,
    /// Validate against the Mozilla root store from `webpki-roots`.
    WebPki,
}

/// A connected plaintext byte stream which can be upgraded in place.
pub trait Connection: Read + Write + Sized {
    type Secure: Read + Write + Split;

    /// Runs the TLS handshake over this connection and returns the
    /// encrypted stream, which owns the underlying socket from now on.
    fn upgrade(self, domain: &str, check: CertificateCheck) -> Result<Self::Secure, ClientError>;
}

/// A stream which can be divided into independently owned halves, so that
/// one thread reads while another one writes.
pub trait Split: Sized {
    type Reader: Read + Send + 'static;
    type Writer: Write + Send + 'static;

    fn split(self) -> std::io::Result<(Self::Reader, Self::Writer)>;
}

impl Connection for TcpStream {
    type Secure = TlsStream;

    fn upgrade(self, domain: &str, check: CertificateCheck) -> Result<TlsStream, ClientError> {
        TlsStream::handshake(self, domain, check)
    }
}

/// Opens the plaintext connection to the server.
pub fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    info!(host, port, "Connecting");
    let stream = TcpStream::connect((host, port))?;
    stream.set_nodelay(true)?;
    info!(peer = %stream.peer_addr()?, "Connected");
    Ok(stream)
}

/// The active socket of a session, plaintext first and encrypted after the
/// STARTTLS upgrade.
///
/// Upper layers read and write through this without knowing which one is
/// active. The plaintext connection is consumed by the upgrade, so nothing
/// can touch it afterwards.
pub enum Transport<C: Connection> {
    Plain(C),
    Secure(C::Secure),
    // Only seen if an upgrade failed half way.
    Lost,
}

impl<C: Connection> Transport<C> {
    pub fn new(connection: C) -> Self {
        Transport::Plain(connection)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Transport::Secure(_))
    }

    /// One blocking read straight from the plaintext socket.
    ///
    /// Used for the STARTTLS acknowledgement which must not go through the
    /// XML reader.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize, ClientError> {
        match self {
            Transport::Plain(connection) => Ok(connection.read(buf)?),
            _ => Err(ProtocolError::BadStream(description::NOT_PLAINTEXT).into()),
        }
    }

    pub fn upgrade(&mut self, domain: &str, check: CertificateCheck) -> Result<(), ClientError> {
        match std::mem::replace(self, Transport::Lost) {
            Transport::Plain(connection) => {
                *self = Transport::Secure(connection.upgrade(domain, check)?);
                Ok(())
            }
            other => {
                *self = other;
                Err(ProtocolError::BadStream(description::ALREADY_ENCRYPTED).into())
            }
        }
    }

    /// Gives up the encrypted stream, for splitting it between the duties of
    /// the message channel.
    pub fn into_secure(self) -> Result<C::Secure, ClientError> {
        match self {
            Transport::Secure(secure) => Ok(secure),
            _ => Err(ProtocolError::BadStream(description::NOT_ENCRYPTED).into()),
        }
    }

    fn lost() -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            description::TRANSPORT_UNAVAILABLE,
        )
    }
}

impl<C: Connection> Read for Transport<C> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(connection) => connection.read(buf),
            Transport::Secure(secure) => secure.read(buf),
            Transport::Lost => Err(Self::lost()),
        }
    }
}

impl<C: Connection> Write for Transport<C> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Transport::Plain(connection) => connection.write(buf),
            Transport::Secure(secure) => secure.write(buf),
            Transport::Lost => Err(Self::lost()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Plain(connection) => connection.flush(),
            Transport::Secure(secure) => secure.flush(),
            Transport::Lost => Err(Self::lost()),
        }
    }
}
