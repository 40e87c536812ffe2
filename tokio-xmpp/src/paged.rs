// Copyright (c) 2024 Jonas Schäfer <jonas@zombofant.net>
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Result Set Management (XEP-0059) paging over a container element.
//!
//! A paged container mixes data children with at most one `<set/>` marker
//! (namespace `http://jabber.org/protocol/rsm`). [`PagedIter`] walks a
//! [`token::Iter`] positioned inside such a container, transparently
//! swallowing the marker and recording the follow-up queries it describes.
//! [`collect_pages`] drives that process end to end against a live
//! [`Session`], re-issuing the caller's IQ template with each follow-up
//! query until the set is exhausted.

use minidom::Element;

use jid::Jid;
use xmpp_parsers::iq::{IqResultPayload, IqSetPayload};
use xmpp_parsers::rsm::{SetQuery, SetResult};

use crate::client::iq::{IqFailure, IqRequest, IqResponse};
use crate::error::Error;
use crate::session::Session;
use crate::xmlstream::token::{Iter, Token, TokenReader};

use tokio::io::{AsyncBufRead, AsyncWrite};

use xmpp_parsers::stanza_error::StanzaError;

fn is_rsm_set(name: &str) -> bool {
    name == "{http://jabber.org/protocol/rsm}set"
}

/// Split a decoded container element into its data children and the
/// [`PageMarker`] describing how to fetch adjacent pages, if any.
///
/// This is the synchronous counterpart of [`PagedIter`] for callers that
/// already hold the whole container as a [`minidom::Element`] (e.g. an IQ
/// result payload), rather than a raw token stream.
pub fn split_items(container: &Element) -> (Vec<Element>, PageMarker) {
    let mut items = Vec::new();
    let mut marker = PageMarker::default();
    for child in container.children() {
        if child.is("set", "http://jabber.org/protocol/rsm") {
            if let Ok(set) = SetResult::try_from(child.clone()) {
                marker.record(&set, None);
            }
            continue;
        }
        items.push(child.clone());
    }
    (items, marker)
}

/// The follow-up queries derived from an observed `<set/>` marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMarker {
    /// Query to fetch the page after the current one, if the marker carried
    /// a `last` id.
    pub next_page: Option<SetQuery>,
    /// Query to fetch the page before the current one, if the marker
    /// carried a `first` id.
    pub previous_page: Option<SetQuery>,
}

impl PageMarker {
    fn record(&mut self, set: &SetResult, max: Option<usize>) {
        if let Some(last) = &set.last {
            self.next_page = Some(SetQuery {
                max,
                after: Some(last.clone()),
                before: None,
                index: None,
            });
        }
        if let Some(first) = &set.first {
            self.previous_page = Some(SetQuery {
                max,
                after: None,
                before: Some(first.item.clone()),
                index: None,
            });
        }
    }
}

/// Walks a token-level container, yielding its data children and swallowing
/// the `<set/>` marker transparently.
///
/// `max` is carried through to the derived [`PageMarker`]'s queries so a
/// caller-configured page size survives across page turns.
pub struct PagedIter<R> {
    inner: Iter<R>,
    max: Option<usize>,
    marker: PageMarker,
}

impl<R: TokenReader + 'static> PagedIter<R> {
    /// Wrap a reader positioned at the start of the container's content.
    pub fn new(inner: R, max: Option<usize>) -> Self {
        PagedIter {
            inner: Iter::new(inner),
            max,
            marker: PageMarker::default(),
        }
    }

    /// Advance to and return the next data child, skipping the `<set/>`
    /// marker (if any) along the way.
    pub async fn next_item(&mut self) -> Result<Option<Element>, Error> {
        loop {
            if !self.inner.next().await {
                return match self.inner.err() {
                    Some(e) => Err(e),
                    None => Ok(None),
                };
            }
            let (start, child) = self.inner.current().expect("next() returned true");
            let is_marker = matches!(start, Token::StartElement { name, .. } if is_rsm_set(name));
            let element = child.into_element().await?;
            if is_marker {
                if let Ok(set) = SetResult::try_from(element) {
                    self.marker.record(&set, self.max);
                }
                continue;
            }
            return Ok(Some(element));
        }
    }

    /// The paging queries derived from the marker observed so far.
    pub fn marker(&self) -> &PageMarker {
        &self.marker
    }

    /// Drain any remaining tokens so the underlying stream can be reused.
    pub async fn close(self) -> Result<(), Error> {
        self.inner.close().await
    }
}

/// Drive an IQ-backed paged traversal to completion.
///
/// `make_request` builds the payload for each page: it receives `None` for
/// the first page and `Some(query)` (from the previous page's
/// [`PageMarker::next_page`]) for every follow-up. Traversal stops once a
/// page's marker carries no further `next_page`, or `make_request` returns
/// `None` to signal there is nothing left to ask for.
pub async fn collect_pages<Io, T, F>(
    session: &Session<Io>,
    to: Option<Jid>,
    mut make_request: F,
) -> Result<Vec<Element>, PagedError>
where
    Io: AsyncBufRead + AsyncWrite + Unpin,
    T: IqSetPayload + IqResultPayload,
    F: FnMut(Option<SetQuery>) -> Option<T>,
{
    let mut items = Vec::new();
    let mut query = None;
    loop {
        let Some(payload) = make_request(query.take()) else {
            break;
        };
        let element: Element = payload.into();
        let resp = session.send_iq(to.clone(), IqRequest::Set(element)).await?;
        let result = match resp {
            IqResponse::Error(e) => return Err(PagedError::Stanza(e)),
            IqResponse::Result(r) => r,
        };
        let Some(result) = result else { break };
        let (page_items, marker) = split_items(&result);
        items.extend(page_items);
        match marker.next_page {
            Some(next) => query = Some(next),
            None => break,
        }
    }
    Ok(items)
}

/// An error encountered while driving [`collect_pages`].
#[derive(Debug)]
pub enum PagedError {
    /// The IQ could not be sent or its response tracked.
    Request(IqFailure),
    /// The peer replied with a stanza-level error.
    Stanza(StanzaError),
}

impl From<IqFailure> for PagedError {
    fn from(e: IqFailure) -> Self {
        PagedError::Request(e)
    }
}

impl core::fmt::Display for PagedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PagedError::Request(e) => write!(f, "paged request failed: {}", e),
            PagedError::Stanza(e) => write!(f, "paged request returned an error: {:?}", e),
        }
    }
}

impl std::error::Error for PagedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_items_extracts_marker_and_data() {
        let container: Element = "<query xmlns='urn:example'>\
             <item id='a'/>\
             <item id='b'/>\
             <set xmlns='http://jabber.org/protocol/rsm'><last>b</last><count>2</count></set>\
             </query>"
            .parse()
            .unwrap();
        let (items, marker) = split_items(&container);
        assert_eq!(items.len(), 2);
        assert_eq!(
            marker.next_page.as_ref().and_then(|q| q.after.clone()),
            Some("b".to_string())
        );
        assert!(marker.previous_page.is_none());
    }

    #[test]
    fn split_items_without_marker_has_no_pages() {
        let container: Element = "<query xmlns='urn:example'><item id='a'/></query>"
            .parse()
            .unwrap();
        let (items, marker) = split_items(&container);
        assert_eq!(items.len(), 1);
        assert_eq!(marker.next_page, None);
        assert_eq!(marker.previous_page, None);
    }
}
