use crate::dex::error::DexError;

/// Decodes an unsigned LEB128 value, pulling one byte at a time from `next`.
///
/// Stops at the first byte with the high bit clear. DEX values are 32-bit, so
/// at most five bytes are consumed; bits beyond 32 are dropped.
pub(crate) fn read_uleb128_with<F>(mut next: F) -> Result<u32, DexError>
where
    F: FnMut() -> Result<u8, DexError>,
{
    let mut value: u32 = 0;
    let mut shift: u32 = 0;
    let mut count: usize = 0;

    loop {
        let byte = next()?;
        count += 1;

        let low = (byte & 0x7F) as u32;
        if shift < 32 {
            value |= low.wrapping_shl(shift);
        }
        shift = shift.saturating_add(7);

        if (byte & 0x80) == 0 || count == 5 {
            break;
        }
    }

    Ok(value)
}

#[cfg(test)]
pub(crate) fn encode_uleb128(value: u32) -> Vec<u8> {
    let mut result = Vec::new();
    let mut remaining = value;

    loop {
        let mut byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        result.push(byte);
        if remaining == 0 {
            break;
        }
    }

    result
}
