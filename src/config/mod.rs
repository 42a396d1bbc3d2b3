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

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

pub use error::ConfigError;

use crate::Jid;
use crate::OutboundMessage;

pub const DEFAULT_CONFIG_FILE: &str = "ikschat_config.json";

/// Settings read from the JSON configuration file.
///
/// ```
/// let config = ikschat::Config::from_json(r#"{
///     "server_name": "example.com",
///     "user_name": "alice",
///     "password": "secret",
///     "receiver": "bob@example.com"
/// }"#).unwrap();
/// assert_eq!(config.jid().unwrap().full(), "alice@example.com");
/// ```
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Domain of the account, also used for the SRV lookup.
    pub server_name: String,
    pub user_name: String,
    /// May be left empty, the password is asked for then.
    #[serde(default)]
    pub password: String,
    /// Address all outbound messages go to.
    pub receiver: String,
    /// Sent when an empty line is entered.
    #[serde(default)]
    pub default_message: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path)?;
        Config::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server_name.is_empty() {
            return Err(ConfigError::Missing("server_name"));
        }
        if self.user_name.is_empty() {
            return Err(ConfigError::Missing("user_name"));
        }
        if self.receiver.is_empty() {
            return Err(ConfigError::Missing("receiver"));
        }
        self.jid()?;
        self.receiver_jid()?;
        Ok(())
    }

    /// The bare JID of the account.
    pub fn jid(&self) -> Result<Jid, ConfigError> {
        Ok(Jid::from_parts(&self.user_name, &self.server_name)?)
    }

    pub fn receiver_jid(&self) -> Result<Jid, ConfigError> {
        Ok(Jid::new(&self.receiver)?)
    }

    /// Asks for the password with the given prompt function if the file
    /// left it empty.
    pub fn fill_password<F>(&mut self, prompt: F) -> Result<(), ConfigError>
    where
        F: FnOnce(String) -> std::io::Result<String>,
    {
        if self.password.is_empty() {
            let jid = self.jid()?;
            self.password = prompt(format!("Password for {jid}: "))?;
        }
        Ok(())
    }

    /// Turns one line of console input into a message for the receiver.
    ///
    /// The line terminator is dropped and an empty line stands for the
    /// default message.
    pub fn message_for(&self, line: &str) -> OutboundMessage {
        let text = line.trim_end_matches(['\r', '\n']);
        let body = if text.is_empty() {
            self.default_message.as_str()
        } else {
            text
        };
        OutboundMessage::new(self.receiver.as_str(), body)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_name", &self.server_name)
            .field("user_name", &self.user_name)
            .field("receiver", &self.receiver)
            .field("default_message", &self.default_message)
            .finish_non_exhaustive()
    }
}
