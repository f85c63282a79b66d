//! Test data helpers

use bytes::Bytes;
use rand::RngCore;
use skyvault_renter::ContractTerms;

/// `len` random bytes
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    Bytes::from(data)
}

/// Terms every default renter config accepts
pub fn cheap_terms() -> ContractTerms {
    ContractTerms {
        price_per_byte_block: 1,
        max_duration: 1_000_000,
    }
}
