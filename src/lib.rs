/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod channel;
mod config;
pub mod constants;
mod discovery;
mod error;
mod jid;
mod parser;
mod reader;
mod session;
pub mod stanza;
mod transport;

#[cfg(test)]
mod testing;

pub use parser::Location;
pub use parser::ParseError;
pub use parser::StreamToken;
pub use parser::StreamTokenizer;
pub use parser::TokenHandler;

pub use error::ClientError;
pub use error::ProtocolError;

pub use jid::BadJid;
pub use jid::Jid;

pub use config::Config;
pub use config::ConfigError;
pub use config::DEFAULT_CONFIG_FILE;

pub use discovery::Endpoint;
pub use discovery::lookup_srv;
pub use discovery::parse_server;
pub use discovery::resolve;

pub use reader::FramedReader;
pub use reader::StanzaEvent;

pub use transport::CertificateCheck;
pub use transport::Connection;
pub use transport::Split;
pub use transport::TlsReader;
pub use transport::TlsStream;
pub use transport::TlsWriter;
pub use transport::Transport;
pub use transport::connect;

pub use session::HandshakeState;
pub use session::Session;

pub use channel::ChannelEvent;
pub use channel::MessageChannel;
pub use channel::MessageSender;
pub use channel::OutboundMessage;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
