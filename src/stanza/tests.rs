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

#[test]
fn escaping() {
    const NOESCAPE: &str = "abc$#@!%^*(){}[]=-+/.,;:FDSF3443";
    assert!(matches!(escape(NOESCAPE), Cow::Borrowed(NOESCAPE)));
    assert_eq!(escape("abc&def"), "abc&amp;def");
    assert_eq!(escape("<>&'\""), "&lt;&gt;&amp;&apos;&quot;");
}

#[test]
fn sasl_plain() {
    let blob = sasl_plain_credentials("alice", "secret");
    assert_eq!(blob, BASE64.encode(b"alice\x00alice\x00secret"));
    assert_eq!(blob, "YWxpY2UAYWxpY2UAc2VjcmV0");

    let decoded = BASE64.decode(&blob).unwrap();
    let fields: Vec<&[u8]> = decoded.split(|b| *b == 0).collect();
    assert_eq!(fields, [&b"alice"[..], &b"alice"[..], &b"secret"[..]]);

    assert_eq!(
        sasl_plain_auth("alice", "secret"),
        "<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='PLAIN'>YWxpY2UAYWxpY2UAc2VjcmV0</auth>"
    );
}

#[test]
fn stream_header_is_stable() {
    let jid = Jid::from_parts("alice", "example.com").unwrap();
    let header = stream_header(&jid);
    assert_eq!(
        header,
        "<?xml version='1.0'?><stream:stream from='alice@example.com' to='example.com' \
         version='1.0' xml:lang='en' xmlns='jabber:client' \
         xmlns:stream='http://etherx.jabber.org/streams'>"
    );
    assert_eq!(stream_header(&jid), header);
    assert_eq!(stream_header(&jid.clone()), header);
}

#[test]
fn fragments() {
    assert_eq!(
        starttls(),
        "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>"
    );
    assert_eq!(
        bind_request("abc123"),
        "<iq id='abc123' type='set'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'/></iq>"
    );
    assert_eq!(
        message("bob@example.com", "fish & chips <3", "ikschat-1"),
        "<message to=\"bob@example.com\"><body>fish &amp; chips &lt;3</body><id>ikschat-1</id></message>"
    );
}
