/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::error::description;
use super::*;

#[derive(Debug, PartialEq, Eq)]
enum Tok {
    Start(String),
    Attr(String, String),
    Empty,
    End(String),
    Text(String),
}

fn start(name: &str) -> Tok {
    Tok::Start(name.to_string())
}

fn attr(name: &str, value: &str) -> Tok {
    Tok::Attr(name.to_string(), value.to_string())
}

fn end(name: &str) -> Tok {
    Tok::End(name.to_string())
}

fn text(s: &str) -> Tok {
    Tok::Text(s.to_string())
}

struct Collector {
    tokens: Vec<Tok>,
}

impl TokenHandler for Collector {
    fn handle_token(&mut self, token: &StreamToken) -> Result<(), ParseError> {
        self.tokens.push(match token {
            StreamToken::StartTag(name) => start(name),
            StreamToken::Attribute(name, value) => attr(name, value),
            StreamToken::EmptyElementTag => Tok::Empty,
            StreamToken::EndTag(name) => end(name),
            StreamToken::CData(s) => text(s),
        });
        Ok(())
    }
}

fn check(s: &str, expected: &[Tok]) {
    let mut collector = Collector { tokens: Vec::new() };
    let mut tokenizer = StreamTokenizer::new();
    tokenizer
        .parse_bytes(&mut collector, s.as_bytes())
        .unwrap();
    assert_eq!(collector.tokens, expected);
    assert_eq!(tokenizer.location().bytes, s.len());

    // now try byte by byte
    let mut collector = Collector { tokens: Vec::new() };
    let mut tokenizer = StreamTokenizer::new();
    for i in 0..s.len() {
        tokenizer
            .parse_bytes(&mut collector, &s.as_bytes()[i..i + 1])
            .unwrap();
    }
    assert_eq!(collector.tokens, expected);
}

fn check_error(bytes: &[u8], expected: &'static str, bad_byte: usize) {
    let mut collector = Collector { tokens: Vec::new() };
    let mut tokenizer = StreamTokenizer::new();
    assert_eq!(
        tokenizer.parse_bytes(&mut collector, bytes),
        Err(ParseError::BadXml(expected))
    );
    assert_eq!(tokenizer.location().bytes, bad_byte);
}

#[test]
fn tags() {
    check("<lonely/>", &[start("lonely"), Tok::Empty]);
    check("  <lonely />  ", &[start("lonely"), Tok::Empty]);
    check(
        "<a><b>hello</b></a >",
        &[start("a"), start("b"), text("hello"), end("b"), end("a")],
    );
}

#[test]
fn attributes() {
    check(
        "<iq type='set' id=\"bind_1\"/>",
        &[start("iq"), attr("type", "set"), attr("id", "bind_1"), Tok::Empty],
    );
    check(
        "<a  x = 'it&apos;s'  y='&lt;&#65;&#x42;&gt;'>",
        &[start("a"), attr("x", "it's"), attr("y", "<AB>")],
    );
}

#[test]
fn stream_stays_open() {
    let mut collector = Collector { tokens: Vec::new() };
    let mut tokenizer = StreamTokenizer::new();
    tokenizer
        .parse_bytes(
            &mut collector,
            b"<?xml version='1.0'?><stream:stream xmlns:stream='http://etherx.jabber.org/streams'>",
        )
        .unwrap();
    assert_eq!(tokenizer.depth(), 1);
    tokenizer
        .parse_bytes(&mut collector, b"<message><body>hi</body></message>")
        .unwrap();
    assert_eq!(tokenizer.depth(), 1);
    assert_eq!(
        collector.tokens,
        &[
            start("stream:stream"),
            attr("xmlns:stream", "http://etherx.jabber.org/streams"),
            start("message"),
            start("body"),
            text("hi"),
            end("body"),
            end("message"),
        ]
    );
}

#[test]
fn restarted_stream() {
    check(
        "<stream:stream><?xml version='1.0'?><stream:stream id='x'><f/>",
        &[
            start("stream:stream"),
            start("stream:stream"),
            attr("id", "x"),
            start("f"),
            Tok::Empty,
        ],
    );
    check(
        "<stream:stream></stream:stream><?xml version='1.0'?><stream:stream>",
        &[
            start("stream:stream"),
            end("stream:stream"),
            start("stream:stream"),
        ],
    );
}

#[test]
fn character_data() {
    check(
        "<body>a &amp; b<![CDATA[ <raw> ]] ]]>c&#x20AC;</body>",
        &[start("body"), text("a & b <raw> ]] c\u{20ac}"), end("body")],
    );
    check(
        "<m>\u{e7}\u{131}\u{11f}\u{1f600}</m>",
        &[start("m"), text("\u{e7}\u{131}\u{11f}\u{1f600}"), end("m")],
    );
}

#[test]
fn restricted_markup() {
    check_error(
        b"<stream><!-- no -->",
        description::MARKUP_RESTRICTED,
        10,
    );
    check_error(b"<!DOCTYPE x>", description::MARKUP_RESTRICTED, 2);
    check_error(b"<a><!ENTITY", description::MARKUP_UNRECOGNIZED, 5);
}

#[test]
fn bad_xml() {
    check_error(b"</a>", description::TAG_CLOSE_WITHOUT_OPEN, 1);
    check_error(b"text", description::DOC_CDATA_WITHOUT_PARENT, 0);
    check_error(b"<a b >", description::TAG_ATTRIBUTE_WITHOUT_EQUAL, 5);
    check_error(b"<a b>", description::TAG_ATTRIBUTE_BAD_NAME, 4);
    check_error(b"<a b=c>", description::TAG_ATTRIBUTE_WITHOUT_QUOTE, 5);
    check_error(b"<a>&foo;", description::REFERENCE_CUSTOM_ENTITY, 7);
    check_error(b"<a>&#1z;", description::REFERENCE_INVALID_DECIMAL, 6);
    check_error(b"<a>&#xg;", description::REFERENCE_INVALID_HEX, 6);
    check_error(b"<a>&#0;", description::CHAR_INVALID, 6);
    check_error(b"<a></a/>", description::TAG_DOUBLE_END, 6);
    check_error(b"<a>\x01", description::CHAR_INVALID, 3);
    check_error(b"<a>\xc3\x28", description::UTF8_INVALID_CONT_BYTE, 4);
    check_error(b"<a>\xc0\x80", description::UTF8_OVERLONG_SEQUENCE, 4);
    check_error(b"<a>\xff", description::UTF8_INVALID_PREFIX_BYTE, 3);
}
