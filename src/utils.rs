pub(crate) fn u32_to_bytes(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub(crate) fn u64_to_bytes(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

pub(crate) fn bytes_to_u32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0_u32, |acc, &b| (acc << 8) | b as u32)
}

/// Big-endian decode of at most 8 bytes; longer inputs keep only the low 64 bits.
pub(crate) fn bytes_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0_u64, |acc, &b| (acc << 8) | b as u64)
}

/// Writes the `out.len()` least significant bytes of `value`, big-endian.
pub(crate) fn u64_to_bytes_into(out: &mut [u8], value: u64) {
    let bytes = u64_to_bytes(value);
    let len = out.len().min(8);
    let pad = out.len() - len;
    out[..pad].fill(0);
    out[pad..].copy_from_slice(&bytes[8 - len..]);
}

pub(crate) fn set_u32_at(array: &mut [u8], value: u32, start_index: usize) {
    array[start_index..start_index + 4].copy_from_slice(&u32_to_bytes(value));
}

pub(crate) fn set_u64_at(array: &mut [u8], value: u64, start_index: usize) {
    array[start_index..start_index + 8].copy_from_slice(&u64_to_bytes(value));
}

pub(crate) fn get_u32_at(array: &[u8], start_index: usize) -> u32 {
    bytes_to_u32(&array[start_index..start_index + 4])
}

pub(crate) fn get_u64_at(array: &[u8], start_index: usize) -> u64 {
    bytes_to_u64(&array[start_index..start_index + 8])
}

pub(crate) fn xor_into(target: &mut [u8], mask: &[u8]) {
    target
        .iter_mut()
        .zip(mask.iter())
        .for_each(|(t, m)| *t ^= *m);
}

/// Keeps the `bits` least significant bits of `value`.
pub(crate) fn mask_u64(value: u64, bits: usize) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1_u64 << bits) - 1)
    }
}
