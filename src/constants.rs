/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const CLIENT_SRV_SERVICE: &str = "_xmpp-client._tcp";

pub const STREAM_NS: &str = "http://etherx.jabber.org/streams";

pub const CLIENT_NS: &str = "jabber:client";

pub const TLS_NS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

pub const SASL_NS: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

pub const BIND_NS: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// Local name of the stream root, which never terminates a framed read.
pub const STREAM_NAME: &str = "stream";

pub const FAILURE_NAME: &str = "failure";

pub const PROCEED_NAME: &str = "proceed";

pub const IQ_NAME: &str = "iq";

pub const MESSAGE_NAME: &str = "message";

/// Upper bound of the raw STARTTLS acknowledgement.
pub const STARTTLS_ACK_SIZE: usize = 256;

/// Used for the bind request when the server gave no stream id.
pub const FALLBACK_BIND_ID: &str = "bind_1";

/// Tracing target of the on-wire activity.
pub(crate) const WIRE_LOG: &str = "ikschat::wire";

/// Log filter used when `RUST_LOG` is unset. Protocol traffic is echoed.
pub const DEFAULT_LOG_FILTER: &str = "ikschat=info,ikschat::wire=debug";

/// Prefix of the ids given to outbound messages.
pub const MESSAGE_ID_PREFIX: &str = "ikschat-";
