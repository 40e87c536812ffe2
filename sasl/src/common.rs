// Copyright (c) 2020 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Credential and secret types shared by mechanism implementations.

/// A password, in whichever form a mechanism needs it.
///
/// Mechanisms that need a derived form (e.g. a PBKDF2 digest for SCRAM)
/// accept a [`crate::secret::Secret`] implementation instead; `Password`
/// only covers the common "I just have the plaintext" case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Password {
    /// The plaintext password.
    Plain(String),
}

/// Credentials handed to a [`crate::client::Mechanism`] constructor.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    /// The authentication identity (often the localpart of the JID).
    pub username: String,

    /// The password, if the mechanism needs one.
    pub password: Option<Password>,

    /// TLS channel-binding data (`tls-server-end-point` etc.), used by
    /// the `-PLUS` variants of SCRAM mechanisms.
    pub channel_binding: Option<Vec<u8>>,
}

impl Credentials {
    /// Start building credentials for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: None,
            channel_binding: None,
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Attach a plaintext password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Password::Plain(password.into()));
        self
    }

    /// Attach TLS channel-binding data, if the transport made any
    /// available.
    pub fn with_channel_binding(mut self, channel_binding: Option<Vec<u8>>) -> Self {
        self.channel_binding = channel_binding;
        self
    }
}
