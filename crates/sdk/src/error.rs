//! SDK error types.
//!
//! [`SdkError`] is the unified error type for all SDK operations. Payloads
//! are small and typed (amounts, counts, a rejected note id); there are no
//! free-form message strings except where a collaborator supplies one.
//! [`SdkError::kind`] folds every variant onto the [`ErrorKind`] taxonomy.

use std::fmt;

use hearth_storage::StorageError;
use hearth_transport::TransportError;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse error classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Quorum not reached, or the client is not connected.
    Connection,
    /// Not enough balance for the requested amount.
    Balance,
    /// Malformed or expired input: notes, tokens, amounts, ids, invites.
    Validation,
    /// Unknown or inactive backend, unknown federation.
    Configuration,
    /// Mandatory privacy wrapping failed or was disabled.
    Privacy,
    /// Role-based spending limit refused the operation.
    SpendingLimit,
    /// A collaborator call failed, timed out, or the router was busy.
    Execution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Balance => write!(f, "balance"),
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Privacy => write!(f, "privacy"),
            Self::SpendingLimit => write!(f, "spending_limit"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

// ---------------------------------------------------------------------------
// NoteRejection
// ---------------------------------------------------------------------------

/// Why a redemption batch was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Expired,
    BadDenomination,
    DuplicateInBatch,
    AlreadyRedeemed,
    SpendKeyMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::BadDenomination => write!(f, "non-canonical denomination"),
            Self::DuplicateInBatch => write!(f, "duplicate in batch"),
            Self::AlreadyRedeemed => write!(f, "already redeemed"),
            Self::SpendKeyMismatch => write!(f, "spend key mismatch"),
        }
    }
}

/// The first offending note of a rejected batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRejection {
    pub note_id: String,
    pub reason: RejectReason,
}

// ---------------------------------------------------------------------------
// SdkError
// ---------------------------------------------------------------------------

/// Errors from SDK operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The orchestrator has been shut down (cancellation token fired).
    Cancelled,

    /// Fewer guardians answered `online` than the threshold requires.
    QuorumUnavailable { online: usize, threshold: usize },

    /// The quorum client has not connected yet.
    NotConnected,

    /// The requested amount exceeds the spendable balance.
    InsufficientBalance { requested: u64, available: u64 },

    /// The amount is zero, or a fee consumes all of it.
    InvalidAmount,

    /// The threshold is zero or larger than the guardian set.
    InvalidThreshold { threshold: usize, guardians: usize },

    /// No guardian endpoints were supplied.
    NoGuardians,

    /// A redemption batch was empty.
    EmptyBatch,

    /// A redemption batch contained an invalid note.
    InvalidNotes(NoteRejection),

    /// An e-cash token could not be parsed or names the wrong protocol.
    InvalidToken,

    /// The invite code is malformed, expired, or unknown.
    InvalidInvite,

    /// The node manager does not know this backend.
    UnknownBackend,

    /// The backend exists but is not active, failed its security check, or
    /// has no registered connector.
    InactiveBackend,

    /// No federation with this id is registered.
    UnknownFederation,

    /// Mandatory privacy wrapping failed.
    PrivacyWrapFailed,

    /// The privacy service returned an unwrapped invoice for a trusted flow.
    PrivacyDisabled,

    /// The offspring daily cap refuses this amount.
    SpendingLimitExceeded {
        requested: u64,
        remaining: u64,
        requires_approval: bool,
    },

    /// A Lightning backend call failed.
    BackendFailed,

    /// The federation's Lightning gateway failed.
    GatewayFailed,

    /// A backend attempt exceeded its timeout.
    Timeout,

    /// Another operation is already running on this router.
    Busy,

    /// A keyed store or lock failed.
    StoreFailed,

    /// A guardian transport could not be constructed.
    TransportFailed,
}

impl SdkError {
    /// Maps this error onto the public taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuorumUnavailable { .. } | Self::NotConnected => ErrorKind::Connection,
            Self::InsufficientBalance { .. } => ErrorKind::Balance,
            Self::InvalidAmount
            | Self::InvalidThreshold { .. }
            | Self::NoGuardians
            | Self::EmptyBatch
            | Self::InvalidNotes(_)
            | Self::InvalidToken
            | Self::InvalidInvite => ErrorKind::Validation,
            Self::UnknownBackend | Self::InactiveBackend | Self::UnknownFederation => {
                ErrorKind::Configuration
            }
            Self::PrivacyWrapFailed | Self::PrivacyDisabled => ErrorKind::Privacy,
            Self::SpendingLimitExceeded { .. } => ErrorKind::SpendingLimit,
            Self::Cancelled
            | Self::BackendFailed
            | Self::GatewayFailed
            | Self::Timeout
            | Self::Busy
            | Self::StoreFailed
            | Self::TransportFailed => ErrorKind::Execution,
        }
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::QuorumUnavailable { online, threshold } => {
                write!(f, "quorum unavailable: {online} online, {threshold} required")
            }
            Self::NotConnected => write!(f, "federation client not connected"),
            Self::InsufficientBalance {
                requested,
                available,
            } => write!(
                f,
                "insufficient balance: requested {requested} sats, available {available} sats"
            ),
            Self::InvalidAmount => write!(f, "invalid amount"),
            Self::InvalidThreshold {
                threshold,
                guardians,
            } => write!(f, "invalid threshold {threshold} for {guardians} guardians"),
            Self::NoGuardians => write!(f, "no guardian endpoints"),
            Self::EmptyBatch => write!(f, "empty redemption batch"),
            Self::InvalidNotes(rejection) => write!(
                f,
                "invalid note {}: {}",
                rejection.note_id, rejection.reason
            ),
            Self::InvalidToken => write!(f, "invalid e-cash token"),
            Self::InvalidInvite => write!(f, "invalid or expired invite"),
            Self::UnknownBackend => write!(f, "unknown backend"),
            Self::InactiveBackend => write!(f, "backend not active"),
            Self::UnknownFederation => write!(f, "unknown federation"),
            Self::PrivacyWrapFailed => write!(f, "privacy wrapping failed"),
            Self::PrivacyDisabled => write!(f, "privacy wrapping disabled"),
            Self::SpendingLimitExceeded {
                requested,
                remaining,
                ..
            } => write!(
                f,
                "spending limit exceeded: requested {requested} sats, {remaining} sats remaining"
            ),
            Self::BackendFailed => write!(f, "lightning backend failed"),
            Self::GatewayFailed => write!(f, "federation gateway failed"),
            Self::Timeout => write!(f, "attempt timed out"),
            Self::Busy => write!(f, "router busy"),
            Self::StoreFailed => write!(f, "store operation failed"),
            Self::TransportFailed => write!(f, "transport setup failed"),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<StorageError> for SdkError {
    fn from(_: StorageError) -> Self {
        Self::StoreFailed
    }
}

impl From<TransportError> for SdkError {
    fn from(_: TransportError) -> Self {
        Self::TransportFailed
    }
}
