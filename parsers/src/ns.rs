// Copyright (c) 2017-2018 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Namespace constants for the RFC 6120/6121 core and the handful of XEPs
//! this crate implements.

/// The default namespace used by stanzas exchanged between a client and its
/// server.
pub const DEFAULT_NS: &str = "jabber:client";

/// Namespace of the `<stream:stream/>` root element and its children other
/// than `<stream:features/>` and `<stream:error/>`.
pub const STREAM: &str = "http://etherx.jabber.org/streams";

/// Namespace of `<starttls/>`/`<proceed/>`/`<failure/>`.
pub const TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

/// Namespace of `<auth/>`/`<challenge/>`/`<response/>`/`<success/>`/`<failure/>`.
pub const SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

/// Namespace of `<bind/>`.
pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

/// Namespace of `<error/>` children inside a stanza-level `<error/>`.
pub const XMPP_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

/// Namespace of XEP-0030 `<query/>` for feature/identity discovery.
pub const DISCO_INFO: &str = "http://jabber.org/protocol/disco#info";

/// Namespace of XEP-0030 `<query/>` for item discovery.
pub const DISCO_ITEMS: &str = "http://jabber.org/protocol/disco#items";

/// Namespace of XEP-0059 Result Set Management.
pub const RSM: &str = "http://jabber.org/protocol/rsm";

/// Namespace of XEP-0047 In-Band Bytestreams.
pub const IBB: &str = "http://jabber.org/protocol/ibb";

/// Namespace of XEP-0115 Entity Capabilities.
pub const CAPS: &str = "http://jabber.org/protocol/caps";

/// Namespace of XEP-0300 cryptographic hash elements.
pub const HASHES: &str = "urn:xmpp:hashes:2";

/// Namespace of XEP-0004 Data Forms.
pub const DATA_FORMS: &str = "jabber:x:data";

/// Namespace of XEP-0221 Data Forms Media Element.
pub const MEDIA_ELEMENT: &str = "urn:xmpp:media-element";
