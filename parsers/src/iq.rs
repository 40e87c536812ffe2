// Copyright (c) 2017 Emmanuel Gil Peyrot <linkmauve@linkmauve.fr>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use jid::Jid;
use minidom::Element;
use xso::error::{Error, FromElementError};

use crate::ns;
use crate::stanza_error::StanzaError;

/// Should be implemented on every known payload of a `<iq type='get'/>`.
pub trait IqGetPayload: TryFrom<Element> + Into<Element> {}

/// Should be implemented on every known payload of a `<iq type='set'/>`.
pub trait IqSetPayload: TryFrom<Element> + Into<Element> {}

/// Should be implemented on every known payload of a `<iq type='result'/>`.
pub trait IqResultPayload: TryFrom<Element> + Into<Element> {}

/// The payload of an `<iq/>`, which depends on its `type` attribute.
#[derive(Debug, Clone)]
pub enum IqType {
    /// The payload of a `type='get'` request.
    Get(Element),

    /// The payload of a `type='set'` request.
    Set(Element),

    /// The payload of a `type='result'` response, absent when the request
    /// doesn’t call for one.
    Result(Option<Element>),

    /// The payload of a `type='error'` response.
    Error(StanzaError),
}

/// The main structure representing the `<iq/>` stanza.
#[derive(Debug, Clone)]
pub struct Iq {
    /// The JID emitting this stanza.
    pub from: Option<Jid>,

    /// The recipient of this stanza.
    pub to: Option<Jid>,

    /// The @id attribute of this stanza, required to match a request with
    /// its response.
    pub id: String,

    /// The payload of this stanza.
    pub payload: IqType,
}

impl Iq {
    fn new(id: impl Into<String>, payload: IqType) -> Iq {
        Iq {
            from: None,
            to: None,
            id: id.into(),
            payload,
        }
    }

    /// Creates an `<iq type='get'/>` with the given payload.
    pub fn from_get(id: impl Into<String>, payload: impl IqGetPayload) -> Iq {
        Iq::new(id, IqType::Get(payload.into()))
    }

    /// Creates an `<iq type='set'/>` with the given payload.
    pub fn from_set(id: impl Into<String>, payload: impl IqSetPayload) -> Iq {
        Iq::new(id, IqType::Set(payload.into()))
    }

    /// Creates an `<iq type='result'/>` with the given, optional, payload.
    pub fn from_result(id: impl Into<String>, payload: Option<impl IqResultPayload>) -> Iq {
        Iq::new(id, IqType::Result(payload.map(Into::into)))
    }

    /// Creates an `<iq type='error'/>` carrying the given error.
    pub fn from_error(id: impl Into<String>, error: StanzaError) -> Iq {
        Iq::new(id, IqType::Error(error))
    }

    /// Sets the `from` attribute of this stanza.
    pub fn with_from<J: Into<Option<Jid>>>(mut self, from: J) -> Iq {
        self.from = from.into();
        self
    }

    /// Sets the `to` attribute of this stanza.
    pub fn with_to<J: Into<Option<Jid>>>(mut self, to: J) -> Iq {
        self.to = to.into();
        self
    }
}

impl TryFrom<Element> for Iq {
    type Error = FromElementError;

    fn try_from(root: Element) -> Result<Iq, FromElementError> {
        check_self!(root, "iq", DEFAULT_NS);
        check_no_unknown_attributes!(root, "iq", ["from", "to", "id", "type"]);
        let from = get_attr!(root, "from", Option);
        let to = get_attr!(root, "to", Option);
        let id = get_attr!(root, "id", Required);
        let type_: String = get_attr!(root, "type", Required);

        let mut payload = None;
        let mut error_payload = None;
        for child in root.children() {
            if type_ == "error" && child.is("error", ns::DEFAULT_NS) {
                if error_payload.is_some() {
                    return Err(Error::Other("Wrong number of children in iq element.").into());
                }
                error_payload = Some(StanzaError::try_from(child.clone())?);
            } else {
                if payload.is_some() {
                    return Err(Error::Other("Wrong number of children in iq element.").into());
                }
                payload = Some(child.clone());
            }
        }

        let payload = match type_.as_ref() {
            "get" => match payload {
                Some(payload) => IqType::Get(payload),
                None => {
                    return Err(Error::Other("Wrong number of children in iq element.").into())
                }
            },
            "set" => match payload {
                Some(payload) => IqType::Set(payload),
                None => {
                    return Err(Error::Other("Wrong number of children in iq element.").into())
                }
            },
            "result" => IqType::Result(payload),
            "error" => match error_payload {
                Some(error) => IqType::Error(error),
                None => {
                    return Err(Error::Other("Wrong number of children in iq element.").into())
                }
            },
            _ => return Err(Error::Other("Unknown iq type.").into()),
        };

        Ok(Iq {
            from,
            to,
            id,
            payload,
        })
    }
}

impl From<Iq> for Element {
    fn from(iq: Iq) -> Element {
        let type_ = match iq.payload {
            IqType::Get(_) => "get",
            IqType::Set(_) => "set",
            IqType::Result(_) => "result",
            IqType::Error(_) => "error",
        };
        let builder = Element::builder("iq", ns::DEFAULT_NS)
            .attr("from", iq.from)
            .attr("to", iq.to)
            .attr("id", iq.id)
            .attr("type", type_);
        match iq.payload {
            IqType::Get(payload) | IqType::Set(payload) => builder.append(payload).build(),
            IqType::Result(Some(payload)) => builder.append(payload).build(),
            IqType::Result(None) => builder.build(),
            IqType::Error(error) => builder.append(Element::from(error)).build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stanza_error::{DefinedCondition, ErrorType};

    #[test]
    fn test_require_type() {
        let elem: Element = "<iq xmlns='jabber:client' id='1'/>".parse().unwrap();
        let error = Iq::try_from(elem).unwrap_err();
        let message = match error {
            FromElementError::Invalid(Error::Other(string)) => string,
            _ => panic!(),
        };
        assert_eq!(message, "Required attribute 'type' missing.");
    }

    #[test]
    fn test_get() {
        let elem: Element = "<iq xmlns='jabber:client' id='req1' type='get'>
            <foo/>
        </iq>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        let query: Element = "<foo/>".parse().unwrap();
        assert_eq!(iq.from, None);
        assert_eq!(iq.to, None);
        assert_eq!(iq.id, "req1");
        assert!(match iq.payload {
            IqType::Get(element) => element == query,
            _ => false,
        });
    }

    #[test]
    fn test_result_empty() {
        let elem: Element = "<iq xmlns='jabber:client' id='req1' type='result'/>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        assert_eq!(iq.id, "req1");
        assert!(matches!(iq.payload, IqType::Result(None)));
    }

    #[test]
    fn test_error() {
        let elem: Element = "<iq xmlns='jabber:client' id='req1' type='error'>
            <foo/>
            <error type='cancel'>
                <service-unavailable xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/>
            </error>
        </iq>"
            .parse()
            .unwrap();
        let iq = Iq::try_from(elem).unwrap();
        assert_eq!(iq.id, "req1");
        match iq.payload {
            IqType::Error(error) => {
                assert_eq!(error.type_, ErrorType::Cancel);
                assert_eq!(error.defined_condition, DefinedCondition::ServiceUnavailable);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_serialise() {
        let elem: Element = "<iq xmlns='jabber:client' id='req1' type='result'/>"
            .parse()
            .unwrap();
        let iq = Iq::from_result(
            "req1",
            None::<crate::disco::DiscoInfoResult>,
        );
        let elem2 = Element::from(iq);
        assert_eq!(elem, elem2);
    }
}
