/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

fn endpoint(host: &str, port: u16) -> Endpoint {
    Endpoint {
        host: host.to_string(),
        port,
    }
}

#[test]
fn server_addresses() {
    assert_eq!(parse_server("example.com").unwrap(), endpoint("example.com", 5222));
    assert_eq!(parse_server("example.com:5300").unwrap(), endpoint("example.com", 5300));
    assert_eq!(parse_server(" 10.0.0.1:1 ").unwrap(), endpoint("10.0.0.1", 1));
    assert_eq!(parse_server("::1").unwrap(), endpoint("::1", 5222));
    assert_eq!(parse_server("[::1]").unwrap(), endpoint("::1", 5222));
    assert_eq!(parse_server("[fe80::2]:5223").unwrap(), endpoint("fe80::2", 5223));
}

#[test]
fn bad_server_addresses() {
    for server in ["", ":5222", "example.com:", "example.com:x", "example.com:70000", "[::1", "[::1]5222", "[]:5222"] {
        assert!(
            matches!(parse_server(server), Err(ConfigError::BadServer(_))),
            "accepted {server:?}"
        );
    }
}

#[test]
fn endpoint_display() {
    assert_eq!(endpoint("example.com", 5222).to_string(), "example.com:5222");
    assert_eq!(endpoint("fe80::2", 5223).to_string(), "[fe80::2]:5223");
}

#[test]
fn srv_ordering() {
    let candidate = |priority, weight, target: &str, port| SrvCandidate {
        priority,
        weight,
        target: target.to_string(),
        port,
    };
    let ordered = order_candidates(vec![
        candidate(20, 0, "backup.example.com.", 5222),
        candidate(10, 5, "light.example.com.", 5223),
        candidate(10, 50, "heavy.example.com.", 5224),
        candidate(5, 0, ".", 0),
    ]);
    assert_eq!(
        ordered,
        [
            endpoint("heavy.example.com", 5224),
            endpoint("light.example.com", 5223),
            endpoint("backup.example.com", 5222),
        ]
    );
    assert!(order_candidates(Vec::new()).is_empty());
}

#[test]
fn explicit_server_skips_lookup() {
    assert_eq!(
        resolve("example.com", Some("xmpp.example.net")).unwrap(),
        endpoint("xmpp.example.net", 5222)
    );
    assert!(matches!(
        resolve("example.com", Some("xmpp.example.net:port")),
        Err(ClientError::Config(ConfigError::BadServer(_)))
    ));
}
