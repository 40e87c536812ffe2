// Copyright (c) 2020 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The client-side SASL mechanism interface.
//!
//! This crate does not ship any mechanism implementations: the stream
//! negotiator drives whatever the caller supplies via this trait, usually
//! ordered from strongest to weakest and filtered against the mechanisms
//! the peer advertised.

use crate::common::Credentials;
use crate::error::MechanismError;

/// A client-side SASL mechanism.
///
/// Implementors drive a single authentication attempt: `initial` produces
/// the (possibly empty) client-first payload sent with `<auth/>`,
/// `response` answers each `<challenge/>`, and `success` gets a chance to
/// verify the server's `<success/>` payload (used by SCRAM's server
/// signature check).
pub trait Mechanism {
    /// The mechanism's SASL name, as advertised in
    /// `urn:ietf:params:xml:ns:xmpp-sasl`'s `<mechanism/>` list (e.g.
    /// `"SCRAM-SHA-256"`).
    fn name(&self) -> &str;

    /// Construct this mechanism from credentials.
    fn from_credentials(credentials: Credentials) -> Result<Self, MechanismError>
    where
        Self: Sized;

    /// The initial client response, sent as the `<auth/>` payload.
    fn initial(&mut self) -> Result<Vec<u8>, MechanismError> {
        Ok(Vec::new())
    }

    /// Respond to a `<challenge/>` payload from the server.
    fn response(&mut self, challenge: &[u8]) -> Result<Vec<u8>, MechanismError> {
        let _ = challenge;
        Ok(Vec::new())
    }

    /// Verify the `<success/>` payload from the server, if the mechanism
    /// sends one (e.g. SCRAM's server signature).
    fn success(&mut self, data: &[u8]) -> Result<(), MechanismError> {
        let _ = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Mechanism for Null {
        fn name(&self) -> &str {
            "NULL-TEST"
        }

        fn from_credentials(_credentials: Credentials) -> Result<Self, MechanismError> {
            Ok(Null)
        }
    }

    #[test]
    fn default_methods_are_no_ops() {
        let mut m = Null::from_credentials(Credentials::new("alice")).unwrap();
        assert_eq!(m.initial().unwrap(), Vec::<u8>::new());
        assert_eq!(m.response(b"ignored").unwrap(), Vec::<u8>::new());
        assert!(m.success(b"ignored").is_ok());
    }
}
