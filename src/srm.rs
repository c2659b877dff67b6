//! Single Response Mode flow control.
//!
//! SRM is negotiated per operation through a pair of headers:
//! `SingleResponseMode` (enable/disable) and `SingleResponseModeParameter`
//! (next/wait). Once enabled, a GET pipeline no longer alternates
//! request/response; the server streams `Continue` responses until done,
//! pausing only while the peer has asked to wait.
//!
//! The semantics of the header pair depend on direction, so the automaton
//! exists in a server flavour and a client flavour. Both only advance at
//! OBEX exchange boundaries: the state machines snapshot the headers of one
//! object into [`SrmHeaders`] and apply them when the object is complete.

use obex_types::header::{SrmpValue, SrmValue};

/// SRM header pair of the current OBEX object.
///
/// Reset at the start of every object; headers overwrite the fields as they
/// are parsed.
#[derive(Clone, Copy, Debug)]
pub struct SrmHeaders {
    pub srm: SrmValue,
    pub srmp: SrmpValue,
}

impl SrmHeaders {
    pub fn new() -> Self {
        Self {
            srm: SrmValue::Disable,
            srmp: SrmpValue::Next,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SrmHeaders {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-side SRM automaton.
///
/// `SendConfirm`/`SendConfirmWait` are armed when the client requested SRM;
/// the confirmation header goes out with the next response, see
/// [`ServerSrmState::confirm`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ServerSrmState {
    #[default]
    Disabled,
    SendConfirm,
    SendConfirmWait,
    Enabled,
    EnabledWait,
}

impl ServerSrmState {
    /// Applies the SRM headers of a completed request object.
    pub fn handle_headers(&mut self, headers: &SrmHeaders) {
        let next = match self {
            Self::Disabled if headers.srm == SrmValue::Enable => {
                if headers.srmp == SrmpValue::Wait {
                    Self::SendConfirmWait
                } else {
                    Self::SendConfirm
                }
            }
            Self::EnabledWait if headers.srmp == SrmpValue::Next => Self::Enabled,
            _ => return,
        };
        log::debug!("srm: {:?} -> {:?}", self, next);
        *self = next;
    }

    /// Called while composing a response; returns whether an
    /// `SingleResponseMode = Enable` header must be added to it.
    pub fn confirm(&mut self) -> bool {
        let next = match self {
            Self::SendConfirm => Self::Enabled,
            Self::SendConfirmWait => Self::EnabledWait,
            _ => return false,
        };
        log::debug!("srm: {:?} -> {:?}", self, next);
        *self = next;
        true
    }

    /// Whether the server may stream the next response without a new GET.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Client-side SRM automaton.
///
/// The client offers SRM on the first request of an operation and then
/// tracks the server's answer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClientSrmState {
    #[default]
    Disabled,
    /// SRM offered, waiting for the server's confirmation.
    W4Confirm,
    /// Confirmed, but the server asked us to hold further requests.
    EnabledButWaiting,
    Enabled,
}

impl ClientSrmState {
    /// Arms the automaton after an `SingleResponseMode = Enable` header was
    /// added to an outgoing request.
    pub fn offered(&mut self) {
        *self = Self::W4Confirm;
    }

    /// Applies the SRM headers of a completed response object.
    pub fn handle_headers(&mut self, headers: &SrmHeaders) {
        let next = match self {
            Self::W4Confirm => match headers.srm {
                SrmValue::Enable => {
                    if headers.srmp == SrmpValue::Wait {
                        Self::EnabledButWaiting
                    } else {
                        Self::Enabled
                    }
                }
                _ => Self::Disabled,
            },
            Self::EnabledButWaiting => {
                if headers.srmp == SrmpValue::Wait {
                    Self::EnabledButWaiting
                } else {
                    Self::Enabled
                }
            }
            _ => return,
        };
        log::debug!("srm: {:?} -> {:?}", self, next);
        *self = next;
    }

    /// Whether responses keep coming without further requests from us.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}
