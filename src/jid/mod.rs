/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;

use std::fmt::Display;

pub use error::BadJid;
use error::description;

const MAX_PART_SIZE: usize = 1023;

fn check_local(local: &str) -> Result<(), BadJid> {
    if local.is_empty() {
        return Err(BadJid(description::LOCAL_EMPTY));
    }
    if local.len() > MAX_PART_SIZE {
        return Err(BadJid(description::LOCAL_TOO_LONG));
    }
    if local.contains(['@', '/']) {
        return Err(BadJid(description::LOCAL_BAD_CHAR));
    }
    Ok(())
}

fn check_domain(domain: &str) -> Result<&str, BadJid> {
    // Remove final dot as per RFC 7622 section 3.2
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        return Err(BadJid(description::DOMAIN_EMPTY));
    }
    if domain.len() > MAX_PART_SIZE {
        return Err(BadJid(description::DOMAIN_TOO_LONG));
    }
    if domain.contains(['@', '/']) {
        return Err(BadJid(description::DOMAIN_BAD_CHAR));
    }
    Ok(domain)
}

fn check_resource(resource: &str) -> Result<(), BadJid> {
    if resource.is_empty() {
        return Err(BadJid(description::RESOURCE_EMPTY));
    }
    if resource.len() > MAX_PART_SIZE {
        return Err(BadJid(description::RESOURCE_TOO_LONG));
    }
    Ok(())
}

/// The address of an entity in the XMPP protocol.
///
/// Has an optional local part, a domain part which names the server, and an
/// optional resource part which the server assigns to a session during
/// resource binding. See [RFC7622](https://datatracker.ietf.org/doc/rfc7622/).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    full: String,
    at_pos: Option<usize>,
    slash_pos: Option<usize>,
}

impl Jid {
    /// Parses a JID string such as `juliet@example.com/balcony`.
    pub fn new(jid: &str) -> Result<Self, BadJid> {
        let (bare, resource) = match jid.split_once('/') {
            Some((bare, resource)) => (bare, Some(resource)),
            None => (jid, None),
        };
        let (local, domain) = match bare.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, bare),
        };
        if let Some(local) = local {
            check_local(local)?;
        }
        let domain = check_domain(domain)?;
        if let Some(resource) = resource {
            check_resource(resource)?;
        }

        let mut full = String::with_capacity(jid.len());
        let mut at_pos = None;
        if let Some(local) = local {
            full.push_str(local);
            at_pos = Some(full.len());
            full.push('@');
        }
        full.push_str(domain);
        let mut slash_pos = None;
        if let Some(resource) = resource {
            slash_pos = Some(full.len());
            full.push('/');
            full.push_str(resource);
        }
        Ok(Jid {
            full,
            at_pos,
            slash_pos,
        })
    }

    /// Builds a bare JID from a user name and a server domain.
    pub fn from_parts(local: &str, domain: &str) -> Result<Self, BadJid> {
        check_local(local)?;
        let domain = check_domain(domain)?;
        Ok(Jid {
            full: format!("{local}@{domain}"),
            at_pos: Some(local.len()),
            slash_pos: None,
        })
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    /// The JID without its resource part.
    pub fn bare(&self) -> &str {
        match self.slash_pos {
            Some(pos) => &self.full[..pos],
            None => &self.full,
        }
    }

    pub fn localpart(&self) -> Option<&str> {
        self.at_pos.map(|pos| &self.full[..pos])
    }

    pub fn domainpart(&self) -> &str {
        let start = self.at_pos.map_or(0, |pos| pos + 1);
        &self.bare()[start..]
    }

    pub fn resourcepart(&self) -> Option<&str> {
        self.slash_pos.map(|pos| &self.full[pos + 1..])
    }

    pub fn is_bare(&self) -> bool {
        self.slash_pos.is_none()
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}
