// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stanza dispatch by kind.
//!
//! A [`Multiplexer`] routes incoming IQs, messages and presences to
//! handlers registered for the stanza's `(type, payload qualified name)`,
//! the way [`crate::session::Session::serve`] hands every non-correlated
//! stanza off to a single dispatch point instead of a hand-rolled `match`.
//! Handlers take the addressing information as arguments rather than
//! holding a reference back to the session, mirroring how discovery
//! handlers in this codebase's lineage take their agent as a parameter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use jid::Jid;
use minidom::Element;
use xmpp_parsers::{
    data_forms::DataForm,
    disco::{Feature, Identity, Item},
    message::{Message, MessageType},
    presence::{Presence, Type as PresenceType},
    stanza_error::{DefinedCondition, ErrorType, StanzaError},
};

/// Either an IQ `get` or `set`; the only two types routed through a
/// multiplexer (`result`/`error` are claimed by the session's correlation
/// map before a multiplexer ever sees them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqKind {
    /// `<iq type='get'/>`
    Get,
    /// `<iq type='set'/>`
    Set,
}

/// The outcome of a routed IQ handler.
pub enum IqOutcome {
    /// The handler produced a result payload (possibly empty).
    Result(Option<Element>),
    /// The handler rejected the request with a stanza error.
    Error(StanzaError),
}

/// A stanza handler registered with a [`Multiplexer`].
///
/// All methods default to doing nothing so a handler can opt into only the
/// capabilities it needs; `for_features`/`for_identities`/`for_items`/
/// `for_forms` iterate every registered handler and collect what
/// [`features`][Self::features] et al. report, independent of which routes
/// (if any) the handler is registered under.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle a routed IQ. Returning `None` causes the multiplexer to
    /// reply with a default `service-unavailable` error.
    async fn handle_iq(&self, _from: Option<Jid>, _payload: Element) -> Option<IqOutcome> {
        None
    }

    /// Handle a routed or wildcard message.
    async fn handle_message(&self, _from: Option<Jid>, _message: Message) {}

    /// Handle a routed or wildcard presence.
    async fn handle_presence(&self, _from: Option<Jid>, _presence: Presence) {}

    /// Service discovery features this handler contributes.
    fn features(&self) -> Vec<Feature> {
        Vec::new()
    }

    /// Service discovery identities this handler contributes.
    fn identities(&self) -> Vec<Identity> {
        Vec::new()
    }

    /// Service discovery items this handler contributes.
    fn items(&self) -> Vec<Item> {
        Vec::new()
    }

    /// Data forms this handler contributes (e.g. extended service discovery
    /// info, XEP-0128).
    fn forms(&self) -> Vec<DataForm> {
        Vec::new()
    }
}

fn qname(element: &Element) -> String {
    match element.ns().as_str() {
        "" => element.name().to_string(),
        ns => format!("{{{}}}{}", ns, element.name()),
    }
}

/// `MessageType`/presence `Type` are plain wire-format enums without
/// `Eq`/`Hash` (they're generated for serialization, not for use as map
/// keys), so routes are keyed on their wire string instead.
fn message_kind_str(t: &MessageType) -> &'static str {
    match t {
        MessageType::Chat => "chat",
        MessageType::Error => "error",
        MessageType::Groupchat => "groupchat",
        MessageType::Headline => "headline",
        MessageType::Normal => "normal",
    }
}

fn presence_kind_str(t: &PresenceType) -> &'static str {
    match t {
        PresenceType::None => "",
        PresenceType::Error => "error",
        PresenceType::Probe => "probe",
        PresenceType::Subscribe => "subscribe",
        PresenceType::Subscribed => "subscribed",
        PresenceType::Unavailable => "unavailable",
        PresenceType::Unsubscribe => "unsubscribe",
        PresenceType::Unsubscribed => "unsubscribed",
    }
}

/// Builds a [`Multiplexer`], panicking at [`build`][Self::build] time on
/// duplicate route registration.
#[derive(Default)]
pub struct MuxBuilder {
    iq: HashMap<(IqKind, String), Arc<dyn Handler>>,
    message: HashMap<(String, String), Arc<dyn Handler>>,
    presence: HashMap<(String, String), Arc<dyn Handler>>,
    handlers: Vec<Arc<dyn Handler>>,
    message_wildcard: Option<Arc<dyn Handler>>,
    presence_wildcard: Option<Arc<dyn Handler>>,
}

impl MuxBuilder {
    /// Start building an empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, handler: &Arc<dyn Handler>) {
        if !self.handlers.iter().any(|h| Arc::ptr_eq(h, handler)) {
            self.handlers.push(Arc::clone(handler));
        }
    }

    /// Register a handler for `<iq type="get"/>` or `type="set"` requests
    /// whose first child has qualified name `payload_name`
    /// (`{namespace}local`, or bare `local` for the empty namespace).
    ///
    /// Panics if a handler is already registered for this `(kind, name)`.
    pub fn with_iq(
        mut self,
        kind: IqKind,
        payload_name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.track(&handler);
        let key = (kind, payload_name.into());
        if self.iq.insert(key.clone(), handler).is_some() {
            panic!("duplicate IQ route registered for {:?}/{}", key.0, key.1);
        }
        self
    }

    /// Register a handler for `<message/>` of the given `type_` whose first
    /// child has qualified name `payload_name`.
    ///
    /// Panics if a handler is already registered for this `(type, name)`.
    pub fn with_message(
        mut self,
        type_: MessageType,
        payload_name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.track(&handler);
        let key = (message_kind_str(&type_).to_string(), payload_name.into());
        if self.message.insert(key.clone(), handler).is_some() {
            panic!("duplicate message route registered for {}/{}", key.0, key.1);
        }
        self
    }

    /// Register a handler for `<presence/>` of the given `type_` whose
    /// first child has qualified name `payload_name`.
    ///
    /// Panics if a handler is already registered for this `(type, name)`.
    pub fn with_presence(
        mut self,
        type_: PresenceType,
        payload_name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.track(&handler);
        let key = (presence_kind_str(&type_).to_string(), payload_name.into());
        if self.presence.insert(key.clone(), handler).is_some() {
            panic!(
                "duplicate presence route registered for {}/{}",
                key.0, key.1
            );
        }
        self
    }

    /// Register the wildcard handler invoked for messages that match no
    /// specific route. Panics if one is already registered.
    pub fn with_message_wildcard(mut self, handler: Arc<dyn Handler>) -> Self {
        self.track(&handler);
        if self.message_wildcard.replace(handler).is_some() {
            panic!("duplicate message wildcard handler registered");
        }
        self
    }

    /// Register the wildcard handler invoked for presences that match no
    /// specific route. Panics if one is already registered.
    pub fn with_presence_wildcard(mut self, handler: Arc<dyn Handler>) -> Self {
        self.track(&handler);
        if self.presence_wildcard.replace(handler).is_some() {
            panic!("duplicate presence wildcard handler registered");
        }
        self
    }

    /// Finalize the multiplexer.
    pub fn build(self) -> Multiplexer {
        Multiplexer {
            iq: self.iq,
            message: self.message,
            presence: self.presence,
            handlers: self.handlers,
            message_wildcard: self.message_wildcard,
            presence_wildcard: self.presence_wildcard,
        }
    }
}

/// Dispatches stanzas to handlers registered by kind.
pub struct Multiplexer {
    iq: HashMap<(IqKind, String), Arc<dyn Handler>>,
    message: HashMap<(String, String), Arc<dyn Handler>>,
    presence: HashMap<(String, String), Arc<dyn Handler>>,
    handlers: Vec<Arc<dyn Handler>>,
    message_wildcard: Option<Arc<dyn Handler>>,
    presence_wildcard: Option<Arc<dyn Handler>>,
}

impl Multiplexer {
    /// Route an IQ request, returning the outcome to reply with.
    ///
    /// `kind`/`payload` come from unpacking an `IqType::Get`/`IqType::Set`.
    /// If no route matches, `Err(())` is returned so the caller can decide
    /// how to reply (the session core itself has no multiplexer-independent
    /// notion of "unhandled", so this is left to the caller rather than
    /// baked in here).
    pub async fn route_iq(
        &self,
        kind: IqKind,
        from: Option<Jid>,
        payload: Element,
    ) -> Result<IqOutcome, ()> {
        let key = (kind, qname(&payload));
        let Some(handler) = self.iq.get(&key) else {
            return Err(());
        };
        Ok(handler
            .handle_iq(from, payload)
            .await
            .unwrap_or_else(|| IqOutcome::Error(service_unavailable())))
    }

    /// Route a message: the first child matching a registered `(type,
    /// name)` route wins; if none match, the wildcard handler (if any)
    /// runs; otherwise the message is dropped.
    pub async fn route_message(&self, message: Message) {
        let from = message.from.clone();
        let kind = message_kind_str(&message.type_).to_string();
        let mut matched = None;
        for payload in &message.payloads {
            let key = (kind.clone(), qname(payload));
            if let Some(handler) = self.message.get(&key) {
                matched = Some(Arc::clone(handler));
                break;
            }
        }
        if let Some(handler) = matched.or_else(|| self.message_wildcard.clone()) {
            handler.handle_message(from, message).await;
        }
    }

    /// Route a presence analogously to [`route_message`][Self::route_message].
    pub async fn route_presence(&self, presence: Presence) {
        let from = presence.from.clone();
        let kind = presence_kind_str(&presence.type_).to_string();
        let mut matched = None;
        for payload in &presence.payloads {
            let key = (kind.clone(), qname(payload));
            if let Some(handler) = self.presence.get(&key) {
                matched = Some(Arc::clone(handler));
                break;
            }
        }
        if let Some(handler) = matched.or_else(|| self.presence_wildcard.clone()) {
            handler.handle_presence(from, presence).await;
        }
    }

    /// All features contributed by registered handlers, for a service
    /// discovery `#info` response.
    pub fn for_features(&self) -> Vec<Feature> {
        self.handlers.iter().flat_map(|h| h.features()).collect()
    }

    /// All identities contributed by registered handlers.
    pub fn for_identities(&self) -> Vec<Identity> {
        self.handlers.iter().flat_map(|h| h.identities()).collect()
    }

    /// All items contributed by registered handlers, for a service
    /// discovery `#items` response.
    pub fn for_items(&self) -> Vec<Item> {
        self.handlers.iter().flat_map(|h| h.items()).collect()
    }

    /// All extended data forms contributed by registered handlers.
    pub fn for_forms(&self) -> Vec<DataForm> {
        self.handlers.iter().flat_map(|h| h.forms()).collect()
    }
}

/// The default error a [`Multiplexer`] (or a caller handling its `Err(())`)
/// replies with when no handler claims an IQ.
pub(crate) fn service_unavailable() -> StanzaError {
    StanzaError::new(
        ErrorType::Cancel,
        DefinedCondition::ServiceUnavailable,
        "en",
        "no handler registered for this request",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle_iq(&self, _from: Option<Jid>, payload: Element) -> Option<IqOutcome> {
            Some(IqOutcome::Result(Some(payload)))
        }

        fn features(&self) -> Vec<Feature> {
            vec![Feature::new("urn:example:echo")]
        }
    }

    #[tokio::test]
    async fn routes_matching_iq_to_handler() {
        let mux = MuxBuilder::new()
            .with_iq(IqKind::Get, "{urn:example:echo}ping", Arc::new(Echo))
            .build();
        let payload: Element = "<ping xmlns='urn:example:echo'/>".parse().unwrap();
        let outcome = mux.route_iq(IqKind::Get, None, payload).await.unwrap();
        assert!(matches!(outcome, IqOutcome::Result(Some(_))));
    }

    #[tokio::test]
    async fn unmatched_iq_is_left_to_the_caller() {
        let mux = MuxBuilder::new().build();
        let payload: Element = "<ping xmlns='urn:example:echo'/>".parse().unwrap();
        assert!(mux.route_iq(IqKind::Get, None, payload).await.is_err());
    }

    #[test]
    #[should_panic(expected = "duplicate IQ route")]
    fn duplicate_iq_route_panics_on_build() {
        MuxBuilder::new()
            .with_iq(IqKind::Get, "{urn:example:echo}ping", Arc::new(Echo))
            .with_iq(IqKind::Get, "{urn:example:echo}ping", Arc::new(Echo));
    }

    #[test]
    fn for_features_collects_across_handlers() {
        let mux = MuxBuilder::new()
            .with_iq(IqKind::Get, "{urn:example:echo}ping", Arc::new(Echo))
            .build();
        assert_eq!(mux.for_features().len(), 1);
    }
}
