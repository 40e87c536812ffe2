// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Service discovery (XEP-0030) responder built on the multiplexer's
//! introspection hooks.
//!
//! [`DiscoResponder`] answers `disco#info`/`disco#items` queries by asking
//! the [`Multiplexer`] it's registered with for every other handler's
//! [`features`][super::mux::Handler::features]/
//! [`identities`][super::mux::Handler::identities]/etc, so individual
//! handlers never need to know the `<query/>` wire format themselves.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;

use jid::Jid;
use minidom::Element;
use xmpp_parsers::disco::{DiscoInfoResult, DiscoItemsResult, Identity};
use xmpp_parsers::ns;

use crate::mux::{Handler, IqKind, IqOutcome, MuxBuilder, Multiplexer};

fn qname(namespace: &str, local: &str) -> String {
    format!("{{{}}}{}", namespace, local)
}

/// Answers `disco#info`/`disco#items` queries for an entity that reports
/// `identity` plus whatever the multiplexer's other handlers contribute.
///
/// [`bind`][Self::bind] must be called once, after [`MuxBuilder::build`],
/// with the very multiplexer [`register`][Self::register] was given —
/// the responder can't hold the finished `Multiplexer` any earlier than
/// that, since it doesn't exist yet while still being registered into it.
pub struct DiscoResponder {
    identity: Identity,
    mux: OnceLock<Weak<Multiplexer>>,
}

impl DiscoResponder {
    /// Build a responder that reports `identity` alongside every other
    /// registered handler's features/items/forms.
    pub fn new(identity: Identity) -> Arc<Self> {
        Arc::new(DiscoResponder {
            identity,
            mux: OnceLock::new(),
        })
    }

    /// Register the `disco#info`/`disco#items` routes on `builder`.
    pub fn register(self: &Arc<Self>, builder: MuxBuilder) -> MuxBuilder {
        builder
            .with_iq(
                IqKind::Get,
                qname(ns::DISCO_INFO, "query"),
                Arc::clone(self) as Arc<dyn Handler>,
            )
            .with_iq(
                IqKind::Get,
                qname(ns::DISCO_ITEMS, "query"),
                Arc::clone(self) as Arc<dyn Handler>,
            )
    }

    /// Bind the multiplexer this responder should introspect. Must be
    /// called exactly once, with the multiplexer `register` was passed to.
    pub fn bind(&self, mux: &Arc<Multiplexer>) {
        if self.mux.set(Arc::downgrade(mux)).is_err() {
            panic!("DiscoResponder::bind called more than once");
        }
    }
}

#[async_trait]
impl Handler for DiscoResponder {
    async fn handle_iq(&self, _from: Option<Jid>, payload: Element) -> Option<IqOutcome> {
        let mux = self.mux.get()?.upgrade()?;
        if payload.name() != "query" {
            return None;
        }
        match payload.ns().as_str() {
            ns if ns == ns::DISCO_INFO => {
                let mut identities = mux.for_identities();
                identities.push(self.identity.clone());
                let result = DiscoInfoResult {
                    node: None,
                    identities,
                    features: mux.for_features(),
                    extensions: mux.for_forms(),
                };
                Some(IqOutcome::Result(Some(result.into())))
            }
            ns if ns == ns::DISCO_ITEMS => {
                let result = DiscoItemsResult {
                    node: None,
                    items: mux.for_items(),
                    rsm: None,
                };
                Some(IqOutcome::Result(Some(result.into())))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::MuxBuilder;
    use xmpp_parsers::disco::Feature;

    struct Chat;

    #[async_trait]
    impl Handler for Chat {
        fn features(&self) -> Vec<Feature> {
            vec![Feature::new("jabber:iq:version")]
        }
    }

    #[tokio::test]
    async fn answers_disco_info_with_aggregated_features() {
        let responder = DiscoResponder::new(Identity::new("client", "bot", "en", "test bot"));
        let builder = responder.register(MuxBuilder::new());
        let builder = builder.with_iq(
            IqKind::Get,
            "{jabber:iq:version}query",
            Arc::new(Chat) as Arc<dyn Handler>,
        );
        let mux = Arc::new(builder.build());
        responder.bind(&mux);

        let query: Element = "<query xmlns='http://jabber.org/protocol/disco#info'/>"
            .parse()
            .unwrap();
        let outcome = mux
            .route_iq(IqKind::Get, None, query)
            .await
            .expect("disco#info is routed");
        let IqOutcome::Result(Some(result)) = outcome else {
            panic!("expected a disco#info result");
        };
        let result = DiscoInfoResult::try_from(result).unwrap();
        assert!(result.identities.iter().any(|i| i.category == "client"));
        assert!(result.features.iter().any(|f| f.var == "jabber:iq:version"));
    }
}
