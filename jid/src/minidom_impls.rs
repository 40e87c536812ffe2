// Copyright (c) 2024 xmpp-rs contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use minidom::{IntoAttributeValue, Node};

use crate::{BareJid, FullJid, Jid};

impl IntoAttributeValue for Jid {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl IntoAttributeValue for FullJid {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl IntoAttributeValue for BareJid {
    fn into_attribute_value(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl From<Jid> for Node {
    fn from(jid: Jid) -> Node {
        Node::Text(jid.to_string())
    }
}

impl From<FullJid> for Node {
    fn from(jid: FullJid) -> Node {
        Node::Text(jid.to_string())
    }
}

impl From<BareJid> for Node {
    fn from(jid: BareJid) -> Node {
        Node::Text(jid.to_string())
    }
}
