//! Note store trait and the note type.

use hearth_storage::StorageError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One issued e-cash note.
///
/// `amount` always equals `denomination`; both fields are kept so a batch
/// with a tampered amount is visible to redemption checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectronicCashNote {
    /// Value in satoshis.
    pub amount: u64,

    /// 32 random bytes, hex-encoded.
    pub note_id: String,

    /// Hex-encoded spend key derived from the issuing client's seed.
    pub spend_key: String,

    /// Canonical denomination in satoshis.
    pub denomination: u64,

    /// Issuance time, unix milliseconds.
    pub issued_at: u64,

    /// Logical expiry, unix milliseconds.
    pub expires_at: u64,
}

impl ElectronicCashNote {
    /// Whether the note has expired at `now_ms`.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at <= now_ms
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Storage for notes issued by one quorum client.
///
/// Besides held notes, the store remembers the ids of every note redeemed
/// through it so a replayed note is refused.
pub trait NoteStore: Send + Sync {
    /// Insert freshly issued notes.
    ///
    /// Fails with [`StorageError::Duplicate`] if any id is already held or
    /// already redeemed; nothing is inserted in that case.
    fn insert_notes(&self, notes: &[ElectronicCashNote]) -> Result<(), StorageError>;

    /// Look up a held note by id.
    fn get_note(&self, note_id: &str) -> Result<Option<ElectronicCashNote>, StorageError>;

    /// Whether this id was redeemed through this store before.
    fn is_redeemed(&self, note_id: &str) -> Result<bool, StorageError>;

    /// Remove the given notes (if held) and record their ids as redeemed.
    fn mark_redeemed(&self, note_ids: &[&str]) -> Result<(), StorageError>;

    /// All held notes.
    fn list_notes(&self) -> Result<Vec<ElectronicCashNote>, StorageError>;

    /// Drop held notes that have expired at `now_ms`. Returns how many.
    fn purge_expired(&self, now_ms: u64) -> Result<usize, StorageError>;

    /// Sum of held note amounts.
    fn total_value(&self) -> Result<u64, StorageError> {
        Ok(self.list_notes()?.iter().map(|n| n.amount).sum())
    }
}
