// Copyright (c) 2020 lumi <lumi@pew.im>
// Copyright (c) 2020 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
// Copyright (c) 2020 Bastien Orivel <eijebong+minidom@bananium.fr>
// Copyright (c) 2020 Astro <astro@spaceboyz.net>
// Copyright (c) 2020 Maxime “pep” Buquet <pep@bouah.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small, simple DOM implementation targeting the subset of XML useful
//! for XMPP stanzas.
//!
//! [`Element`] is the central type: an owned tree of qualified elements,
//! attributes and text, with a [`FromStr`][`std::str::FromStr`]
//! implementation for ad hoc parsing and a builder for construction. The
//! [`xso`](https://docs.rs/xso) crate provides the streaming `AsXml`/
//! `FromXml` bridge on top of this tree for use in derived stanza types.

#![warn(missing_docs)]

pub mod convert;
pub mod element;
pub mod error;

pub use crate::convert::IntoAttributeValue;
pub use crate::element::{Attrs, Children, Element, ElementBuilder, Node, Nodes, PrefixMap, Texts};
pub use crate::error::{Error, Result};
