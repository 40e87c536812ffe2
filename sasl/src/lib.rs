// Copyright (c) 2020 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interfaces for SASL authentication, as used to negotiate the
//! `urn:ietf:params:xml:ns:xmpp-sasl` stream feature.
//!
//! This crate intentionally stops at the [`client::Mechanism`] trait and
//! the credential/secret plumbing ([`common`], [`secret`]) used to drive
//! it: concrete mechanisms (`PLAIN`, `SCRAM-SHA-*`, `ANONYMOUS`, ...) are
//! supplied by the application, since the choice of which mechanisms to
//! support, and any platform-specific secure-storage of credentials, is
//! out of scope for a transport-agnostic negotiation engine.

#![warn(missing_docs)]

pub mod client;
pub mod common;
pub mod error;
pub mod secret;

pub use crate::client::Mechanism;
pub use crate::common::Credentials;
pub use crate::error::MechanismError;
