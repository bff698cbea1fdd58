//! Delta record decoding
//!
//! A delta object stores instructions to rebuild its content from a base
//! object's bytes: copy opcodes referencing base ranges and insert opcodes
//! carrying literal bytes. The stream is prefixed with two varints declaring
//! the base and target sizes, both of which are verified during application.
//!
//! Errors carry a plain reason; the pack store attaches the pack path.

type DeltaResult<T> = Result<T, String>;

/// Decode the little-endian 7-bit-group varint used inside delta streams,
/// returning the value and the number of bytes consumed
pub(crate) fn decode_size_varint(data: &[u8]) -> DeltaResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return Err("varint overflows 64 bits".to_string());
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    Err("varint runs past end of data".to_string())
}

/// Decode a pack entry header: object type code in bits 4-6 of the first
/// byte, the inflated size spread over the low bits
pub(crate) fn decode_entry_header(data: &[u8]) -> DeltaResult<(u8, u64, usize)> {
    let first = *data.first().ok_or("empty entry header")?;
    let type_code = (first >> 4) & 0x07;
    let mut size = u64::from(first & 0x0f);
    let mut shift = 4u32;
    let mut consumed = 1;

    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = *data
            .get(consumed)
            .ok_or("entry header runs past end of pack")?;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        consumed += 1;
    }

    Ok((type_code, size, consumed))
}

/// Decode the negative-offset encoding of an offset-delta base reference:
/// big-endian 7-bit groups with an extra +1 per continuation byte
pub(crate) fn decode_base_offset(data: &[u8]) -> DeltaResult<(u64, usize)> {
    let first = *data.first().ok_or("empty base-offset varint")?;
    let mut value = u64::from(first & 0x7f);
    let mut consumed = 1;

    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = *data
            .get(consumed)
            .ok_or("base-offset varint runs past end of pack")?;
        value = value
            .checked_add(1)
            .and_then(|v| v.checked_shl(7))
            .ok_or("base-offset varint overflows")?
            | u64::from(byte & 0x7f);
        consumed += 1;
    }

    Ok((value, consumed))
}

/// Rebuild target content by applying a delta instruction stream to its
/// resolved base bytes
pub(crate) fn apply_delta(base: &[u8], delta: &[u8]) -> DeltaResult<Vec<u8>> {
    let (base_size, consumed) = decode_size_varint(delta)?;
    let mut pos = consumed;
    if base_size as usize != base.len() {
        return Err(format!(
            "delta declares base size {base_size} but base is {} bytes",
            base.len()
        ));
    }

    let (target_size, consumed) = decode_size_varint(&delta[pos..])?;
    pos += consumed;

    let mut target = Vec::with_capacity(target_size as usize);
    while pos < delta.len() {
        let opcode = delta[pos];
        pos += 1;

        if opcode & 0x80 != 0 {
            // Copy from base: optional little-endian offset/size bytes
            // selected by the low opcode bits
            let mut offset: usize = 0;
            for bit in 0..4 {
                if opcode & (1 << bit) != 0 {
                    let byte = *delta.get(pos).ok_or("copy opcode truncated")?;
                    offset |= (byte as usize) << (8 * bit);
                    pos += 1;
                }
            }

            let mut size: usize = 0;
            for bit in 0..3 {
                if opcode & (1 << (4 + bit)) != 0 {
                    let byte = *delta.get(pos).ok_or("copy opcode truncated")?;
                    size |= (byte as usize) << (8 * bit);
                    pos += 1;
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let end = offset
                .checked_add(size)
                .ok_or("copy range overflows")?;
            if end > base.len() {
                return Err(format!(
                    "copy range {offset}..{end} exceeds base of {} bytes",
                    base.len()
                ));
            }
            target.extend_from_slice(&base[offset..end]);
        } else if opcode != 0 {
            // Insert literal bytes; the opcode itself is the length (1-127)
            let len = opcode as usize;
            let end = pos + len;
            if end > delta.len() {
                return Err("insert opcode truncated".to_string());
            }
            target.extend_from_slice(&delta[pos..end]);
            pos = end;
        } else {
            return Err("reserved zero opcode in delta stream".to_string());
        }
    }

    if target.len() != target_size as usize {
        return Err(format!(
            "delta declares target size {target_size} but produced {} bytes",
            target.len()
        ));
    }

    Ok(target)
}

/// Encode the delta-stream size varint (test fixtures and round-trip checks)
#[cfg(test)]
pub(crate) fn encode_size_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}
