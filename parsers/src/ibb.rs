// Copyright (c) 2017 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use xso::{text::Base64, AsXml, FromXml};

use crate::iq::IqSetPayload;
use crate::ns;

generate_id!(
    /// An identifier matching a stream.
    StreamId
);

generate_attribute!(
/// Which stanza type to use to exchange data.
Stanza, "stanza", {
    /// `<iq/>` gives a feedback on whether the chunk has been received or not,
    /// which is useful in the case the recipient might not receive them in a
    /// timely manner, or to do your own throttling based on the results.
    Iq => "iq",

    /// `<message/>` can be faster, since it doesnâ€™t require any feedback, but in
    /// practice it will be throttled by the servers on the way.
    Message => "message",
}, Default = Iq);

/// Starts an In-Band Bytestream session with the given parameters.
#[derive(FromXml, AsXml, PartialEq, Debug, Clone)]
#[xml(namespace = ns::IBB, name = "open")]
pub struct Open {
    /// Maximum size in bytes for each chunk.
    #[xml(attribute(name = "block-size"))]
    pub block_size: u16,

    /// The identifier to be used to create a stream.
    #[xml(attribute)]
    pub sid: StreamId,

    /// Which stanza type to use to exchange data.
    #[xml(attribute(default))]
    pub stanza: Stanza,
}

impl IqSetPayload for Open {}

/// Exchange a chunk of data in an open stream.
#[derive(FromXml, AsXml, PartialEq, Debug, Clone)]
#[xml(namespace = ns::IBB, name = "data")]
pub struct Data {
    /// Sequence number of this chunk, must wraparound after 65535.
    #[xml(attribute)]
    pub seq: u16,

    /// The identifier of the stream on which data is being exchanged.
    #[xml(attribute)]
    pub sid: StreamId,

    /// Vector of bytes to be exchanged.
    #[xml(text = Base64)]
    pub data: Vec<u8>,
}

impl IqSetPayload for Data {}

/// Close an open stream.
#[derive(FromXml, AsXml, PartialEq, Debug, Clone)]
#[xml(namespace = ns::IBB, name = "close")]
pub struct Close {
    /// The identifier of the stream to be closed.
    #[xml(attribute)]
    pub sid: StreamId,
}

impl IqSetPayload for Close {}
