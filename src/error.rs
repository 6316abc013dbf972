/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Error taxonomy for registry mutations.
//!
//! Every value here is an ordinary result delivered through a completion
//! callback on the host thread; nothing crosses the worker-thread boundary as
//! a panic, since that thread also drives unrelated in-flight network jobs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// `register` called on a scheme with a live entry.
    AlreadyRegistered,
    /// `unregister` or `intercept` called on a scheme with no live entry.
    NotRegistered,
    /// `unintercept` called on a scheme with no shelved original.
    NotIntercepted,
    /// The table refused the substitution: the scheme is handled, but only by
    /// a non-replaceable (built-in) handler, or its shelf slot is occupied.
    InterceptFailed,
    /// Invariant violation that should never occur; surfaced to the caller
    /// rather than swallowed.
    OperationFailed,
    /// The mutation arrived after shutdown was signaled. Recoverable: the
    /// caller should simply stop issuing mutations.
    ShuttingDown,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::AlreadyRegistered => "scheme already has a registered handler",
            Self::NotRegistered => "scheme has no registered handler",
            Self::NotIntercepted => "scheme has no shelved original handler",
            Self::InterceptFailed => "scheme is handled but its handler is not replaceable",
            Self::OperationFailed => "registry invariant violation",
            Self::ShuttingDown => "request context is shutting down",
        };
        f.write_str(message)
    }
}

impl std::error::Error for RegistryError {}
