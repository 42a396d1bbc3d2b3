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
mod location;

use error::description;
pub use error::ParseError;
pub use location::Location;

/// A structural token of an XMPP stream.
#[derive(Debug, Eq, PartialEq)]
pub enum StreamToken<'a> {
    /// A start tag or empty element tag.
    ///
    /// The argument is the qualified name of the tag, prefix included.
    StartTag(&'a str),

    /// An attribute of the last StartTag.
    ///
    /// References in the value are already replaced with the actual characters.
    Attribute(&'a str, &'a str),

    /// The last StartTag was an empty element tag and is closed already.
    EmptyElementTag,

    /// An end tag with its qualified name.
    EndTag(&'a str),

    /// A run of character data.
    ///
    /// Text between two tags is delivered as a single token even when it
    /// arrives split over several reads, and even if it contains references
    /// or character data sections.
    CData(&'a str),
}

pub trait TokenHandler {
    fn handle_token(&mut self, token: &StreamToken) -> Result<(), ParseError>;
}

/// Incremental tokenizer for XMPP streams.
///
/// An XMPP stream is a single XML document which stays open for the whole
/// session, so this tokenizer never expects an end of input. Bytes can be
/// given in chunks of any size, a chunk may end in the middle of a tag or a
/// multi byte character. The restricted XML profile of the protocol is
/// enforced: comments and document type declarations are rejected, while
/// processing instructions (the XML declaration) are skipped wherever they
/// appear, which allows servers to resend the declaration on stream restarts.
///
/// ```
/// use ikschat::{ParseError, StreamToken, StreamTokenizer, TokenHandler};
///
/// struct Printer {}
/// impl TokenHandler for Printer {
///     fn handle_token(&mut self, token: &StreamToken) -> Result<(), ParseError> {
///         println!("{token:?}");
///         Ok(())
///     }
/// }
///
/// let mut tokenizer = StreamTokenizer::new();
/// let mut printer = Printer {};
/// tokenizer.parse_bytes(&mut printer, b"<stream:stream><mess").unwrap();
/// tokenizer.parse_bytes(&mut printer, b"age/>").unwrap();
/// assert_eq!(tokenizer.depth(), 1);
/// ```
pub struct StreamTokenizer {
    state: State,
    uni_len: u32,
    uni_left: u32,
    uni_char: u32,
    depth: usize,
    is_end_tag: bool,
    is_apos_value: bool,
    value_pos: usize,
    buffer: Vec<u8>,
    ref_buffer: Vec<u8>,
    char_ref_value: u32,
    is_value_ref: bool,
    location: Location,
}

#[derive(Debug, Eq, PartialEq)]
enum State {
    Outside,
    TagStart,
    PI,
    PIEnd,
    Markup,
    CDataSectionC,
    CDataSectionCD,
    CDataSectionCDA,
    CDataSectionCDAT,
    CDataSectionCDATA,
    CDataSectionCDATAb,
    CDataSectionBody,
    CDataSectionMaybeEnd,
    CDataSectionMaybeEnd2,
    TagName,
    EndTagWhitespace,
    EmptyTagEnd,
    AttributeWhitespace,
    AttributeName,
    AttributeEq,
    AttributeValueStart,
    AttributeValue,
    CData,
    Reference,
    CharReference,
    CharReferenceBody,
    HexCharReference,
    Entity,
}

const INITIAL_BUFFER_CAPACITY: usize = 256;

const REF_BUFFER_SIZE: usize = 8;

const MAX_CHAR_VALUE: u32 = 0x10ffff;

macro_rules! whitespace {
    () => {
        b' ' | b'\t' | b'\r' | b'\n'
    };
}

fn is_valid_xml_char(c: u32) -> bool {
    matches!(c, 0x09 | 0x0a | 0x0d | 0x20..=0xd7ff | 0xe000..=0xfffd | 0x10000..=MAX_CHAR_VALUE)
}

macro_rules! xml_error {
    ($a:ident) => {
        return Err(ParseError::BadXml(description::$a))
    };
}

fn as_str(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|_| ParseError::BadXml(description::UTF8_INVALID_PREFIX_BYTE))
}

impl StreamTokenizer {
    pub fn new() -> StreamTokenizer {
        StreamTokenizer {
            state: State::Outside,
            uni_len: 0,
            uni_left: 0,
            uni_char: 0,
            depth: 0,
            is_end_tag: false,
            is_apos_value: false,
            value_pos: 0,
            buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            ref_buffer: Vec::with_capacity(REF_BUFFER_SIZE),
            char_ref_value: 0,
            is_value_ref: false,
            location: Location::new(),
        }
    }

    /// Number of currently open elements, the stream root included.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn location(&self) -> Location {
        self.location
    }

    fn extend_buffer(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        if self.buffer.capacity() - self.buffer.len() < bytes.len() {
            let need = std::cmp::max(bytes.len(), self.buffer.capacity());
            if self.buffer.try_reserve(need).is_err() {
                return Err(ParseError::NoMemory);
            }
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn push_char_ref(&mut self) -> Result<(), ParseError> {
        let value = self.char_ref_value;
        if !is_valid_xml_char(value) {
            xml_error!(CHAR_INVALID);
        }
        let Some(c) = char::from_u32(value) else {
            xml_error!(CHAR_INVALID);
        };
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.extend_buffer(encoded.as_bytes())
    }

    fn flush_cdata(&mut self, handler: &mut impl TokenHandler) -> Result<(), ParseError> {
        if !self.buffer.is_empty() {
            handler.handle_token(&StreamToken::CData(as_str(&self.buffer)?))?;
            self.buffer.clear();
        }
        Ok(())
    }

    fn close_element(&mut self, pos: usize, back: &mut usize) -> Result<(), ParseError> {
        if self.depth == 0 {
            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.state = State::Outside;
        } else {
            *back = pos + 1;
            self.state = State::CData;
        }
        Ok(())
    }

    /// Tokenizes the given bytes, calling the handler for each complete token.
    ///
    /// Partial constructs at the end of the chunk are kept and completed by
    /// the following calls.
    pub fn parse_bytes(
        &mut self,
        handler: &mut impl TokenHandler,
        bytes: &[u8],
    ) -> Result<(), ParseError> {
        let mut pos: usize = 0;
        let mut back: usize = 0;

        while pos < bytes.len() {
            let mut redo: bool = false;
            let c = bytes[pos];

            if self.uni_left > 0 {
                if c & 0xc0 != 0x80 {
                    xml_error!(UTF8_INVALID_CONT_BYTE);
                }
                self.uni_char <<= 6;
                self.uni_char += c as u32 & 0x3f;
                self.uni_left -= 1;
                if self.uni_left == 0 {
                    if (self.uni_len == 2 && self.uni_char <= 0x7f)
                        || (self.uni_len == 3 && self.uni_char <= 0x7ff)
                        || (self.uni_len == 4 && self.uni_char <= 0xffff)
                    {
                        xml_error!(UTF8_OVERLONG_SEQUENCE);
                    }
                    if !is_valid_xml_char(self.uni_char) {
                        xml_error!(CHAR_INVALID);
                    }
                }
            } else if c & 0x80 == 0x80 {
                if c & 0x60 == 0x40 {
                    self.uni_len = 2;
                    self.uni_left = 1;
                    self.uni_char = c as u32 & 0x1f;
                } else if c & 0x70 == 0x60 {
                    self.uni_len = 3;
                    self.uni_left = 2;
                    self.uni_char = c as u32 & 0x0f;
                } else if c & 0x78 == 0x70 {
                    self.uni_len = 4;
                    self.uni_left = 3;
                    self.uni_char = c as u32 & 0x07;
                } else {
                    xml_error!(UTF8_INVALID_PREFIX_BYTE);
                }
            } else if c < 0x20 && (c != 0x09 && c != 0x0a && c != 0x0d) {
                xml_error!(CHAR_INVALID);
            }

            match self.state {
                State::Outside => match c {
                    b'<' => self.state = State::TagStart,
                    whitespace!() => (),
                    _ => xml_error!(DOC_CDATA_WITHOUT_PARENT),
                },

                State::TagStart => match c {
                    b'!' => self.state = State::Markup,
                    b'?' => self.state = State::PI,
                    b'/' => {
                        if self.depth == 0 {
                            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                        }
                        self.flush_cdata(handler)?;
                        back = pos + 1;
                        self.is_end_tag = true;
                        self.state = State::TagName;
                    }
                    whitespace!() => xml_error!(TAG_WHITESPACE_START),
                    b'>' => xml_error!(TAG_EMPTY_NAME),
                    _ => {
                        self.flush_cdata(handler)?;
                        self.depth += 1;
                        back = pos;
                        self.is_end_tag = false;
                        self.state = State::TagName;
                    }
                },

                State::Markup => match c {
                    b'[' => {
                        if self.depth == 0 {
                            xml_error!(MARKUP_CDATA_SECTION_OUTSIDE_ROOT);
                        }
                        self.state = State::CDataSectionC;
                    }
                    b'-' | b'D' => xml_error!(MARKUP_RESTRICTED),
                    _ => xml_error!(MARKUP_UNRECOGNIZED),
                },

                State::CDataSectionC => {
                    if c != b'C' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCD;
                }

                State::CDataSectionCD => {
                    if c != b'D' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDA;
                }

                State::CDataSectionCDA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDAT;
                }

                State::CDataSectionCDAT => {
                    if c != b'T' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATA;
                }

                State::CDataSectionCDATA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATAb;
                }

                State::CDataSectionCDATAb => {
                    if c != b'[' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    back = pos + 1;
                    self.state = State::CDataSectionBody;
                }

                State::CDataSectionBody => {
                    if c == b']' {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        self.state = State::CDataSectionMaybeEnd;
                    }
                }

                State::CDataSectionMaybeEnd => match c {
                    b']' => self.state = State::CDataSectionMaybeEnd2,
                    _ => {
                        self.extend_buffer(b"]")?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::CDataSectionMaybeEnd2 => match c {
                    b'>' => {
                        // Section content joins the surrounding text run.
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    b']' => self.extend_buffer(b"]")?,
                    _ => {
                        self.extend_buffer(b"]]")?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::PI => {
                    if c == b'?' {
                        self.state = State::PIEnd;
                    }
                }

                State::PIEnd => match c {
                    b'>' => {
                        if self.depth > 0 {
                            back = pos + 1;
                            self.state = State::CData;
                        } else {
                            self.state = State::Outside;
                        }
                    }
                    b'?' => (),
                    _ => self.state = State::PI,
                },

                State::TagName => match c {
                    b'/' | b'>' | whitespace!() => {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        if self.buffer.is_empty() {
                            xml_error!(TAG_EMPTY_NAME);
                        }
                        {
                            let name = as_str(&self.buffer)?;
                            if self.is_end_tag {
                                if c == b'/' {
                                    xml_error!(TAG_DOUBLE_END);
                                }
                                handler.handle_token(&StreamToken::EndTag(name))?;
                            } else {
                                handler.handle_token(&StreamToken::StartTag(name))?;
                            }
                        }
                        self.buffer.clear();
                        match c {
                            b'/' => {
                                handler.handle_token(&StreamToken::EmptyElementTag)?;
                                self.state = State::EmptyTagEnd;
                            }
                            b'>' => {
                                if self.is_end_tag {
                                    self.close_element(pos, &mut back)?;
                                } else {
                                    back = pos + 1;
                                    self.state = State::CData;
                                }
                            }
                            _ => {
                                if self.is_end_tag {
                                    self.state = State::EndTagWhitespace;
                                } else {
                                    self.state = State::AttributeWhitespace;
                                }
                            }
                        }
                    }
                    _ => (),
                },

                State::EmptyTagEnd => match c {
                    b'>' => self.close_element(pos, &mut back)?,
                    _ => xml_error!(TAG_EMPTY_TAG_MISSING_END),
                },

                State::EndTagWhitespace => match c {
                    b'>' => self.close_element(pos, &mut back)?,
                    whitespace!() => (),
                    _ => xml_error!(TAG_END_TAG_ATTRIBUTES),
                },

                State::AttributeWhitespace => match c {
                    whitespace!() => (),
                    b'/' => {
                        handler.handle_token(&StreamToken::EmptyElementTag)?;
                        self.state = State::EmptyTagEnd;
                    }
                    b'>' => {
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    _ => {
                        back = pos;
                        self.state = State::AttributeName;
                        redo = true;
                    }
                },

                State::AttributeName => match c {
                    b'=' | whitespace!() => {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        if self.buffer.is_empty() {
                            xml_error!(TAG_ATTRIBUTE_BAD_NAME);
                        }
                        if c == b'=' {
                            self.state = State::AttributeValueStart;
                        } else {
                            self.state = State::AttributeEq;
                        }
                    }
                    b'/' | b'>' | b'<' => xml_error!(TAG_ATTRIBUTE_BAD_NAME),
                    _ => (),
                },

                State::AttributeEq => match c {
                    b'=' => self.state = State::AttributeValueStart,
                    whitespace!() => (),
                    _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_EQUAL),
                },

                State::AttributeValueStart => match c {
                    b'"' | b'\'' => {
                        self.is_apos_value = c == b'\'';
                        self.value_pos = self.buffer.len();
                        back = pos + 1;
                        self.state = State::AttributeValue;
                    }
                    whitespace!() => (),
                    _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_QUOTE),
                },

                State::AttributeValue => {
                    if (self.is_apos_value && c == b'\'') || (!self.is_apos_value && c == b'"') {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        {
                            let name = as_str(&self.buffer[..self.value_pos])?;
                            let value = as_str(&self.buffer[self.value_pos..])?;
                            handler.handle_token(&StreamToken::Attribute(name, value))?;
                        }
                        self.buffer.clear();
                        self.state = State::AttributeWhitespace;
                    } else if c == b'&' {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = true;
                        self.state = State::Reference;
                    } else if c == b'<' {
                        xml_error!(TAG_ATTRIBUTE_BAD_VALUE);
                    }
                }

                State::CData => match c {
                    b'<' => {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        self.state = State::TagStart;
                    }
                    b'&' => {
                        if back < pos {
                            self.extend_buffer(&bytes[back..pos])?;
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = false;
                        self.state = State::Reference;
                    }
                    _ => (),
                },

                State::Reference => match c {
                    b'#' => {
                        self.char_ref_value = 0;
                        self.state = State::CharReference;
                    }
                    b';' => xml_error!(REFERENCE_CUSTOM_ENTITY),
                    _ => {
                        self.ref_buffer.push(c);
                        self.state = State::Entity;
                    }
                },

                State::Entity => match c {
                    b';' => {
                        let ent: &[u8] = match self.ref_buffer.as_slice() {
                            b"amp" => b"&",
                            b"lt" => b"<",
                            b"gt" => b">",
                            b"quot" => b"\"",
                            b"apos" => b"'",
                            _ => xml_error!(REFERENCE_CUSTOM_ENTITY),
                        };
                        self.extend_buffer(ent)?;
                        back = pos + 1;
                        self.state = if self.is_value_ref {
                            State::AttributeValue
                        } else {
                            State::CData
                        };
                    }
                    _ => {
                        if self.ref_buffer.len() >= REF_BUFFER_SIZE {
                            xml_error!(REFERENCE_CUSTOM_ENTITY);
                        }
                        self.ref_buffer.push(c);
                    }
                },

                State::CharReference => match c {
                    b'x' => self.state = State::HexCharReference,
                    b'0'..=b'9' => {
                        self.char_ref_value = (c - b'0') as u32;
                        self.state = State::CharReferenceBody;
                    }
                    _ => xml_error!(REFERENCE_INVALID_DECIMAL),
                },

                State::CharReferenceBody | State::HexCharReference => {
                    let radix = if self.state == State::HexCharReference {
                        16
                    } else {
                        10
                    };
                    if c == b';' {
                        self.push_char_ref()?;
                        back = pos + 1;
                        self.state = if self.is_value_ref {
                            State::AttributeValue
                        } else {
                            State::CData
                        };
                    } else {
                        let Some(digit) = (c as char).to_digit(radix) else {
                            if radix == 16 {
                                xml_error!(REFERENCE_INVALID_HEX);
                            }
                            xml_error!(REFERENCE_INVALID_DECIMAL);
                        };
                        self.char_ref_value = self.char_ref_value * radix + digit;
                        if self.char_ref_value > MAX_CHAR_VALUE {
                            xml_error!(CHAR_INVALID);
                        }
                    }
                }
            }

            if !redo {
                pos += 1;
                self.location.advance(c);
            }
        }

        if back < pos {
            match self.state {
                State::TagName
                | State::AttributeName
                | State::AttributeValue
                | State::CData
                | State::CDataSectionBody => self.extend_buffer(&bytes[back..pos])?,
                _ => (),
            }
        }

        Ok(())
    }
}

impl Default for StreamTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
