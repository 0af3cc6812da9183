use thiserror::Error;

/// Recoverable outcomes of a contract-violating call, surfaced instead of a panic.
///
/// FULL and EMPTY are not contract violations (they're `Option::None` from
/// `reserve`/`pop`); this enum only covers [`RingBuffer::cancel`][crate::RingBuffer::cancel]
/// and [`EventProcessor::cancel`][crate::EventProcessor::cancel], which can be
/// called with a sequence number that no longer names a pending reservation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    /// The sequence number does not correspond to any reservation ever issued
    /// at this slot, or the slot has since wrapped to a different generation.
    #[error("sequence {0} does not name a known reservation")]
    UnknownSequence(u64),
    /// The slot at this sequence was already committed.
    #[error("sequence {0} was already committed")]
    AlreadyCommitted(u64),
    /// The slot at this sequence was already cancelled.
    #[error("sequence {0} was already cancelled")]
    AlreadyCancelled(u64),
}
