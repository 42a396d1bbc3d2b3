/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Outbound wire fragments.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::Jid;
use crate::constants::BIND_NS;
use crate::constants::CLIENT_NS;
use crate::constants::SASL_NS;
use crate::constants::STREAM_NS;
use crate::constants::TLS_NS;

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

/// Replaces the XML special characters with predefined entities.
///
/// Safe for both character data and attribute values in either quote style.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '\'', '"']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '<' => escaped.push_str(predefined::LT),
            '>' => escaped.push_str(predefined::GT),
            '&' => escaped.push_str(predefined::AMP),
            '\'' => escaped.push_str(predefined::APOS),
            '"' => escaped.push_str(predefined::QUOT),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// The stream opening header.
///
/// Sent three times during the handshake: on the plain socket, after the TLS
/// upgrade, and after authentication. The output only depends on the JID.
pub fn stream_header(jid: &Jid) -> String {
    format!(
        "<?xml version='1.0'?><stream:stream from='{}' to='{}' version='1.0' xml:lang='en' xmlns='{CLIENT_NS}' xmlns:stream='{STREAM_NS}'>",
        escape(jid.bare()),
        escape(jid.domainpart())
    )
}

pub fn starttls() -> String {
    format!("<starttls xmlns='{TLS_NS}'/>")
}

/// SASL PLAIN initial response: base64 of authzid, authcid and password
/// separated by NUL characters. The user name is used as both identities.
pub fn sasl_plain_credentials(user: &str, password: &str) -> String {
    let mut message = Vec::with_capacity(user.len() * 2 + password.len() + 2);
    message.extend_from_slice(user.as_bytes());
    message.push(0);
    message.extend_from_slice(user.as_bytes());
    message.push(0);
    message.extend_from_slice(password.as_bytes());
    BASE64.encode(message)
}

pub fn sasl_plain_auth(user: &str, password: &str) -> String {
    format!(
        "<auth xmlns='{SASL_NS}' mechanism='PLAIN'>{}</auth>",
        sasl_plain_credentials(user, password)
    )
}

pub fn bind_request(id: &str) -> String {
    format!(
        "<iq id='{}' type='set'><bind xmlns='{BIND_NS}'/></iq>",
        escape(id)
    )
}

/// A chat message. The id goes into a child element, not an attribute.
pub fn message(to: &str, body: &str, id: &str) -> String {
    format!(
        "<message to=\"{}\"><body>{}</body><id>{}</id></message>",
        escape(to),
        escape(body),
        escape(id)
    )
}

#[cfg(test)]
mod tests;
