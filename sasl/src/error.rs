// Copyright (c) 2020 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type returned by [`crate::client::Mechanism`] implementations.

use core::fmt;

/// An error raised by a SASL mechanism implementation while producing an
/// initial payload, a challenge response, or verifying a success payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismError {
    /// The credentials handed to the mechanism were insufficient (e.g. no
    /// password for a mechanism that requires one).
    MissingCredentials,

    /// The server's challenge could not be parsed by the mechanism.
    InvalidChallenge,

    /// The server's success payload failed the mechanism's own
    /// verification (e.g. a SCRAM server signature mismatch).
    ServerVerificationFailed,

    /// A mechanism-specific failure, carried as free text for display.
    Other(String),
}

impl fmt::Display for MechanismError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MechanismError::MissingCredentials => f.write_str("missing credentials"),
            MechanismError::InvalidChallenge => f.write_str("invalid challenge from server"),
            MechanismError::ServerVerificationFailed => {
                f.write_str("server verification failed")
            }
            MechanismError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for MechanismError {}
