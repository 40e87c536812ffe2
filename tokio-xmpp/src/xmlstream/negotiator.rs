// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Post-connect stream feature negotiation: SASL authentication followed by
//! resource binding.
//!
//! STARTTLS is not handled here: upgrading the transport means swapping the
//! concrete `Io` type (e.g. `TcpStream` for a TLS stream), which a single
//! generic function cannot do to itself. That swap, and the stream restart
//! it requires, is the `ServerConnector`'s job (see `crate::connect`),
//! performed before a [`PendingFeaturesRecv`] is ever handed to
//! [`negotiate`]. SASL, by contrast, only restarts the header/features
//! exchange over the same `Io`, which [`XmlStream::initiate_reset`] already
//! supports.

use std::collections::HashSet;
use std::str::FromStr;

use futures::{SinkExt, StreamExt};

use tokio::io::{AsyncBufRead, AsyncWrite};

use jid::FullJid;
use xmpp_parsers::bind::{BindQuery, BindResponse};
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::sasl::{
    Auth, Mechanism as XmppMechanism, Nonza as SaslNonza, Response as SaslResponse,
};
use xmpp_parsers::stream_features::StreamFeatures;

use sasl::client::Mechanism;

use crate::error::{AuthError, Error, ProtocolError};
use crate::xmlstream::{PendingFeaturesRecv, StreamHeader, XmlStream, XmppStreamElement};

const BIND_REQUEST_ID: &str = "_xmpp-bind";

/// Authenticate and bind a resource, returning the ready stream and the
/// full JID the server assigned.
///
/// `mechanisms` is tried in order, most-preferred first; the first one
/// whose [`Mechanism::name`] the server advertised is used. `resource`
/// requests a specific resource (servers may substitute another); `None`
/// lets the server pick one.
///
/// `header` is the stream header to re-send after a successful SASL
/// exchange, since RFC 6120 requires restarting the stream at that point.
pub async fn negotiate<Io>(
    pending: PendingFeaturesRecv<Io>,
    header: StreamHeader<'static>,
    mut mechanisms: Vec<Box<dyn Mechanism + Send>>,
    resource: Option<String>,
) -> Result<(XmlStream<Io, XmppStreamElement>, FullJid), Error>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
{
    let (features, mut stream) = pending.recv_features::<XmppStreamElement>().await?;

    authenticate(&mut stream, &features, &mut mechanisms).await?;

    let pending = stream.initiate_reset().send_header(header).await?;
    let (features, mut stream) = pending.recv_features::<XmppStreamElement>().await?;

    if !features.can_bind() {
        log::warn!("server did not advertise resource binding after authentication");
        return Err(ProtocolError::InvalidBindResponse.into());
    }
    let jid = bind(&mut stream, resource).await?;
    log::debug!("stream ready, bound as {}", jid);
    Ok((stream, jid))
}

async fn authenticate<Io>(
    stream: &mut XmlStream<Io, XmppStreamElement>,
    features: &StreamFeatures,
    mechanisms: &mut [Box<dyn Mechanism + Send>],
) -> Result<(), Error>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
{
    let remote_mechs: HashSet<&str> = features
        .sasl_mechanisms
        .mechanisms
        .iter()
        .map(String::as_str)
        .collect();

    let mechanism = mechanisms
        .iter_mut()
        .find(|m| remote_mechs.contains(m.name()))
        .ok_or(AuthError::NoMechanism)?;

    log::debug!("authenticating with {}", mechanism.name());
    let mechanism_name =
        XmppMechanism::from_str(mechanism.name()).map_err(ProtocolError::Parsers)?;
    let initial = mechanism.initial().map_err(AuthError::Sasl)?;
    stream
        .send(&XmppStreamElement::Sasl(SaslNonza::Auth(Auth {
            mechanism: mechanism_name,
            data: initial,
        })))
        .await?;

    loop {
        match stream.next().await {
            Some(Ok(XmppStreamElement::Sasl(SaslNonza::Challenge(challenge)))) => {
                let response = mechanism.response(&challenge.data).map_err(AuthError::Sasl)?;
                stream
                    .send(&XmppStreamElement::Sasl(SaslNonza::Response(SaslResponse {
                        data: response,
                    })))
                    .await?;
            }
            Some(Ok(XmppStreamElement::Sasl(SaslNonza::Success(success)))) => {
                mechanism.success(&success.data).map_err(AuthError::Sasl)?;
                return Ok(());
            }
            Some(Ok(XmppStreamElement::Sasl(SaslNonza::Failure(failure)))) => {
                log::warn!("SASL failure: {:?}", failure.defined_condition);
                return Err(AuthError::Fail(failure.defined_condition).into());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(Error::Disconnected),
        }
    }
}

async fn bind<Io>(
    stream: &mut XmlStream<Io, XmppStreamElement>,
    resource: Option<String>,
) -> Result<FullJid, Error>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
{
    let iq = Iq::from_set(BIND_REQUEST_ID, BindQuery::new(resource));
    stream.send(&XmppStreamElement::Iq(iq)).await?;

    loop {
        match stream.next().await {
            Some(Ok(XmppStreamElement::Iq(iq))) if iq.id == BIND_REQUEST_ID => match iq.payload {
                IqType::Result(Some(payload)) => {
                    let response = BindResponse::try_from(payload)
                        .map_err(|_| ProtocolError::InvalidBindResponse)?;
                    return Ok(response.into());
                }
                _ => return Err(ProtocolError::InvalidBindResponse.into()),
            },
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(Error::Disconnected),
        }
    }
}
