use thiserror::Error;

use crate::projection::TrackerError;
use crate::roster::claim::ClaimError;
use crate::roster::codec::CodecError;
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => "That slot is already taken. Pick another one.",
            Self::ServiceUnavailable { .. } => {
                "The roster sheet is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// Specific reason behind the failure. Safe to show to the person who
    /// issued the command; transport details never reach this field.
    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl RosterError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

fn bad_request(message: String) -> InterfaceError {
    InterfaceError::BadRequest { message, correlation_id: "unassigned".to_owned() }
}

fn unavailable() -> InterfaceError {
    InterfaceError::ServiceUnavailable {
        message: "roster sheet could not be reached".to_owned(),
        correlation_id: "unassigned".to_owned(),
    }
}

impl From<RosterError> for InterfaceError {
    fn from(value: RosterError) -> Self {
        match value {
            RosterError::Codec(CodecError::NotFound(name))
            | RosterError::Claim(ClaimError::PartyNotFound(name)) => {
                bad_request(format!("Party '{name}' was not found in the roster."))
            }
            RosterError::Claim(ClaimError::AlreadyClaimed { party_name, slot_number, .. }) => {
                Self::Conflict {
                    message: format!(
                        "Slot {slot_number} in party '{party_name}' is already filled."
                    ),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            RosterError::Claim(ClaimError::InvalidSlot(slot)) => {
                bad_request(format!("Slot {slot} is not a roster row; slots start at 1."))
            }
            RosterError::Claim(ClaimError::InvalidClaimant) => {
                bad_request("A player name is required to claim a slot.".to_owned())
            }
            RosterError::Tracker(TrackerError::UnknownThread(_)) => {
                bad_request("This thread is not linked to a roster.".to_owned())
            }
            RosterError::Tracker(TrackerError::AlreadyBound(_)) => {
                bad_request("This thread is already linked to a roster.".to_owned())
            }
            RosterError::Tracker(TrackerError::IndexOutOfRange { party_index, .. }) => {
                Self::Internal {
                    message: format!("no roster message is bound for party {party_index}"),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            RosterError::Claim(ClaimError::ReadFailed(_))
            | RosterError::Claim(ClaimError::WriteFailed(_))
            | RosterError::Tracker(TrackerError::ReadFailed(_))
            | RosterError::Store(_) => unavailable(),
            RosterError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
