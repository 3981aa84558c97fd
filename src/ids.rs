use rand::RngCore;
use rand::rngs::OsRng;

/// The number of random bytes in an id.
const ID_SIZE: usize = 8;

/// Generates a new opaque id of the form `id-<16 hex chars>`.
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_SIZE];
    OsRng.fill_bytes(&mut bytes);

    format!("id-{}", hex::encode(bytes))
}
