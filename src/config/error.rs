/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

use crate::BadJid;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A required field is empty.
    Missing(&'static str),
    BadJid(BadJid),
    BadServer(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read configuration file: {err}"),
            ConfigError::Json(err) => write!(f, "cannot decode configuration file: {err}"),
            ConfigError::Missing(field) => write!(f, "required field '{field}' is empty"),
            ConfigError::BadJid(err) => err.fmt(f),
            ConfigError::BadServer(server) => write!(f, "invalid server address '{server}'"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Json(err) => Some(err),
            ConfigError::BadJid(err) => Some(err),
            ConfigError::Missing(_) | ConfigError::BadServer(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl From<BadJid> for ConfigError {
    fn from(err: BadJid) -> Self {
        ConfigError::BadJid(err)
    }
}
