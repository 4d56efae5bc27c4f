use riyal_core::instruction::Transfer;
use riyal_core::types::Address;

/// Stable key for one distribution batch: same mint, position and legs give
/// the same key, so a ledger can recognise a resubmitted batch.
pub fn batch_idempotency_key(
    mint: &Address,
    sequence_index: usize,
    transfers: &[Transfer],
) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(b"riyal-distribution-batch-v1");
    h.update(mint.as_bytes());
    h.update(&(sequence_index as u64).to_le_bytes());
    for t in transfers {
        h.update(t.to.as_bytes());
        h.update(&t.amount.to_le_bytes());
    }
    *h.finalize().as_bytes()
}
