// Copyright (c) 2024 xmpp-rs contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use core::fmt;

/// Everything that can go wrong when parsing or constructing a [`crate::Jid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Happens when there is no resource in a `Jid`, but a `FullJid` was
    /// expected.
    NoResource,

    /// Happens when the node is empty, that is to say, when the JID starts
    /// with '@'.
    NodeEmpty,

    /// Happens when the domain is empty, that is to say, when the JID
    /// contains no domain, or starts with '/'.
    DomainEmpty,

    /// Happens when the resource is empty, that is to say, when the JID
    /// ends with a '/'.
    ResourceEmpty,

    /// Happens when parsing a bare JID, when a resource is found.
    ResourceInBareJid,

    /// Happens when the localpart is longer than 1023 bytes.
    NodeTooLong,

    /// Happens when the domain is longer than 1023 bytes.
    DomainTooLong,

    /// Happens when the resource is longer than 1023 bytes.
    ResourceTooLong,

    /// Happens when the localpart contains a forbidden character.
    NodeForbiddenChar,

    /// Happens when the domain fails IDNA normalisation, or is otherwise
    /// not a syntactically valid XMPP address domain.
    DomainInvalid,

    /// Happens when a PRECIS preparation profile rejects the localpart or
    /// resourcepart (for instance, because it contains unassigned
    /// codepoints or bidirectional text that is not allowed together).
    PrecisProhibited,
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match self {
            Error::NoResource => "no resource in this JID",
            Error::NodeEmpty => "nodepart empty, but a '@' was found",
            Error::DomainEmpty => "no domain found in this JID",
            Error::ResourceEmpty => "resource empty, but a '/' was found",
            Error::ResourceInBareJid => "resource found in a bare JID",
            Error::NodeTooLong => "localpart longer than 1023 bytes",
            Error::DomainTooLong => "domain longer than 1023 bytes",
            Error::ResourceTooLong => "resource longer than 1023 bytes",
            Error::NodeForbiddenChar => "localpart contains a forbidden character",
            Error::DomainInvalid => "domain failed IDNA normalisation",
            Error::PrecisProhibited => "localpart or resource rejected by PRECIS",
        })
    }
}

impl std::error::Error for Error {}
