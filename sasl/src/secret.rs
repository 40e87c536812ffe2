// Copyright (c) 2020 lumi <lumi@pew.im>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pre-derived secret forms, for mechanisms (such as SCRAM) that can
//! authenticate from a stored digest instead of the plaintext password.
//!
//! This crate does not derive these itself (that's mechanism-specific,
//! and mechanisms live outside this crate) — it only defines the shapes
//! so a credential store can hand over what it has without committing to
//! a particular mechanism.

/// Marker trait for a storable secret form.
pub trait Secret {}

/// A secret derived via PBKDF2, as used by SCRAM-SHA-* mechanisms.
pub trait Pbkdf2Secret {
    /// The salt used during derivation.
    fn salt(&self) -> &[u8];
    /// The iteration count used during derivation.
    fn iterations(&self) -> u32;
    /// The derived digest.
    fn digest(&self) -> &[u8];
}

/// The plaintext password, stored as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plain(pub String);

impl Secret for Plain {}

/// A PBKDF2-HMAC-SHA-1 derived secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pbkdf2Sha1 {
    /// The salt used during derivation.
    pub salt: Vec<u8>,
    /// The iteration count used during derivation.
    pub iterations: u32,
    /// The derived digest.
    pub digest: Vec<u8>,
}

impl Secret for Pbkdf2Sha1 {}

impl Pbkdf2Secret for Pbkdf2Sha1 {
    fn salt(&self) -> &[u8] {
        &self.salt
    }
    fn iterations(&self) -> u32 {
        self.iterations
    }
    fn digest(&self) -> &[u8] {
        &self.digest
    }
}

/// A PBKDF2-HMAC-SHA-256 derived secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pbkdf2Sha256 {
    /// The salt used during derivation.
    pub salt: Vec<u8>,
    /// The iteration count used during derivation.
    pub iterations: u32,
    /// The derived digest.
    pub digest: Vec<u8>,
}

impl Secret for Pbkdf2Sha256 {}

impl Pbkdf2Secret for Pbkdf2Sha256 {
    fn salt(&self) -> &[u8] {
        &self.salt
    }
    fn iterations(&self) -> u32 {
        self.iterations
    }
    fn digest(&self) -> &[u8] {
        &self.digest
    }
}
