/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Finding the host and port to connect to for an XMPP domain.

use std::fmt::Display;

use tracing::info;
use tracing::warn;
use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::ResolverConfig;
use trust_dns_resolver::config::ResolverOpts;

use crate::ClientError;
use crate::ConfigError;
use crate::constants::CLIENT_PORT;
use crate::constants::CLIENT_SRV_SERVICE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses an explicit `HOST[:PORT]` server address.
///
/// IPv6 literals may be given bare or in brackets, but a port can only be
/// attached to the bracketed form. The standard client port is used when no
/// port is given.
pub fn parse_server(server: &str) -> Result<Endpoint, ConfigError> {
    let bad = || ConfigError::BadServer(server.to_string());
    let server = server.trim();
    let (host, port) = if let Some(rest) = server.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(bad)?;
        match after {
            "" => (host, None),
            _ => (host, Some(after.strip_prefix(':').ok_or_else(bad)?)),
        }
    } else {
        let colon_pos = server.find(':');
        let last_colon_pos = server.rfind(':');
        match (colon_pos, last_colon_pos) {
            (Some(first), Some(last)) if first == last => {
                (&server[..first], Some(&server[first + 1..]))
            }
            // None, or several colons of a bare IPv6 literal.
            _ => (server, None),
        }
    };
    if host.is_empty() {
        return Err(bad());
    }
    let port = match port {
        Some(port) => port.parse::<u16>().map_err(|_| bad())?,
        None => CLIENT_PORT,
    };
    Ok(Endpoint {
        host: host.to_string(),
        port,
    })
}

/// One answer of an SRV query.
#[derive(Debug, Clone)]
struct SrvCandidate {
    priority: u16,
    weight: u16,
    target: String,
    port: u16,
}

/// Lower priority first, then higher weight. A target of "." means the
/// service is not offered at all.
fn order_candidates(mut candidates: Vec<SrvCandidate>) -> Vec<Endpoint> {
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.weight.cmp(&a.weight))
    });
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let host = candidate.target.trim_end_matches('.');
            if host.is_empty() {
                return None;
            }
            Some(Endpoint {
                host: host.to_string(),
                port: candidate.port,
            })
        })
        .collect()
}

/// Looks up the `_xmpp-client._tcp` SRV records of the domain, in the order
/// they should be tried.
pub fn lookup_srv(domain: &str) -> Result<Vec<Endpoint>, ClientError> {
    let resolver = match Resolver::from_system_conf() {
        Ok(resolver) => resolver,
        Err(err) => {
            warn!(error = %err, "Cannot load system DNS configuration, using defaults");
            Resolver::new(ResolverConfig::default(), ResolverOpts::default())?
        }
    };
    let name = format!("{CLIENT_SRV_SERVICE}.{domain}.");
    info!(domain, srv = %name, "SRV lookup");
    let lookup = resolver
        .srv_lookup(name.as_str())
        .map_err(|err| ClientError::Discovery(format!("{name}: {err}")))?;
    let candidates = lookup
        .iter()
        .map(|record| SrvCandidate {
            priority: record.priority(),
            weight: record.weight(),
            target: record.target().to_utf8(),
            port: record.port(),
        })
        .collect();
    let endpoints = order_candidates(candidates);
    for endpoint in &endpoints {
        info!(domain, endpoint = %endpoint, "SRV record");
    }
    Ok(endpoints)
}

/// Picks the endpoint to connect to: the explicit server if there is one,
/// otherwise the best SRV record of the domain.
pub fn resolve(domain: &str, server: Option<&str>) -> Result<Endpoint, ClientError> {
    if let Some(server) = server {
        return Ok(parse_server(server)?);
    }
    lookup_srv(domain)?
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::Discovery(format!("no {CLIENT_SRV_SERVICE} service for {domain}")))
}

#[cfg(test)]
mod tests;
