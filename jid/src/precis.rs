// Copyright (c) 2024 xmpp-rs contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Minimal PRECIS-flavoured preparation of the localpart and resourcepart,
//! per RFC 8265. We lean on [`stringprep::saslprep`] rather than a full
//! `UsernameCaseMapped`/`OpaqueString` implementation: its stringprep
//! profile already folds case, maps away non-ASCII space and rejects
//! unassigned/prohibited code points, which covers what the rest of this
//! crate needs from PRECIS in practice.

use stringprep::saslprep;

use crate::error::Error;

/// Prepare a localpart: PRECIS `UsernameCaseMapped`-ish. Case-folds and
/// rejects prohibited code points.
pub(crate) fn username_case_mapped(s: &str) -> Result<String, Error> {
    let prepped = saslprep(s).map_err(|_| Error::PrecisProhibited)?;
    Ok(prepped.to_lowercase())
}

/// Prepare a resourcepart: PRECIS `OpaqueString`-ish. No case folding, just
/// the same prohibited-code-point sweep.
pub(crate) fn opaque_string(s: &str) -> Result<String, Error> {
    let prepped = saslprep(s).map_err(|_| Error::PrecisProhibited)?;
    Ok(prepped.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_case_mapped_folds_case() {
        assert_eq!(username_case_mapped("Romeo").unwrap(), "romeo");
    }

    #[test]
    fn opaque_string_preserves_case() {
        assert_eq!(opaque_string("Orchard").unwrap(), "Orchard");
    }
}
