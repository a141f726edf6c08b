//! A restartable, allocation-free base64 encoder.
//!
//! This is a direct port of the original library's `B64Stream`/`Encode64` pair. The encoder
//! never fails and never allocates: it encodes as much input as it can into as much output
//! space as the caller provides, and it can always be resumed with more of either on the next
//! call. The one subtlety worth preserving from the original is that the same 4-byte working
//! block is reused both to hold up to 3 pending *input* bytes awaiting a full quartet, and to
//! hold up to 4 encoded *output* bytes awaiting emission once the caller's output buffer is
//! full — `block_out` tells you which.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const IN_SIZE: usize = 3;
const OUT_SIZE: usize = 4;

/// Streaming base64 encoder state.
///
/// Create with [`Base64Stream::new`], point `input` at the next chunk of bytes to encode on
/// each call to [`Base64Stream::encode`], and drain `output` afterwards.
#[derive(Debug, Default)]
pub struct Base64Stream {
    total_in: u64,
    total_out: u64,

    /// Up to 4 bytes: either pending input (not yet a full quartet) or pending output
    /// (already encoded, not yet copied out).
    block: [u8; OUT_SIZE],
    /// How many bytes of `block` are currently meaningful.
    block_size: usize,
    /// Whether `block` currently holds encoded output (true) or raw input (false).
    block_out: bool,
}

impl Base64Stream {
    /// Equivalent to the original's `InitEncode64`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes consumed across all calls so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total bytes produced across all calls so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Consumes as much of `input` and fills as much of `output` as possible, returning
    /// `(bytes_consumed, bytes_written)`.
    ///
    /// When `finished` is `false`, the call stops once `input` is exhausted, holding any
    /// partial (1 or 2 byte) group inside the working block for the next call. When
    /// `finished` is `true`, a final padded quartet is emitted for a 1- or 2-byte trailing
    /// group (or nothing, if the previous call left the block empty).
    pub fn encode(&mut self, input: &[u8], output: &mut [u8], finished: bool) -> (usize, usize) {
        let mut in_pos = 0;
        let mut out_pos = 0;

        loop {
            let avail_in = input.len() - in_pos;
            if avail_in == 0 && self.block_size == 0 {
                break;
            }

            // Anything already encoded and waiting to go out? Drain it first.
            if self.block_out && self.block_size != 0 {
                while self.block_size != 0 {
                    if out_pos == output.len() {
                        self.total_in += in_pos as u64;
                        self.total_out += out_pos as u64;
                        return (in_pos, out_pos);
                    }
                    output[out_pos] = self.block[OUT_SIZE - self.block_size];
                    out_pos += 1;
                    self.block_size -= 1;
                }
            }

            // Block is empty; refill it with input.
            self.block_out = false;
            while self.block_size < IN_SIZE {
                if in_pos == input.len() {
                    if !finished || self.block_size == 0 {
                        self.total_in += in_pos as u64;
                        self.total_out += out_pos as u64;
                        return (in_pos, out_pos);
                    }
                    break;
                }
                self.block[self.block_size] = input[in_pos];
                in_pos += 1;
                self.block_size += 1;
            }

            let encoded = encode_block(&self.block, self.block_size);
            self.block = encoded;
            self.block_size = OUT_SIZE;
            self.block_out = true;
        }

        self.total_in += in_pos as u64;
        self.total_out += out_pos as u64;
        (in_pos, out_pos)
    }
}

/// Encodes a 1-, 2-, or 3-byte group into a padded 4-byte quartet.
fn encode_block(group: &[u8; OUT_SIZE], length: usize) -> [u8; OUT_SIZE] {
    let mut padded = [0u8; IN_SIZE];
    padded[..length.min(IN_SIZE)].copy_from_slice(&group[..length.min(IN_SIZE)]);

    let mut out = [0u8; OUT_SIZE];
    out[0] = ALPHABET[(padded[0] >> 2) as usize];
    out[1] = ALPHABET[(((padded[0] & 0x03) << 4) | ((padded[1] & 0xF0) >> 4)) as usize];
    out[2] = if length > 1 {
        ALPHABET[(((padded[1] & 0x0F) << 2) | ((padded[2] & 0xC0) >> 6)) as usize]
    } else {
        b'='
    };
    out[3] = if length > 2 {
        ALPHABET[(padded[2] & 0x3F) as usize]
    } else {
        b'='
    };
    out
}

/// One-shot convenience used by tests and small call sites: encodes the entirety of `data`.
pub fn encode_all(data: &[u8]) -> String {
    let mut stream = Base64Stream::new();
    let mut out = vec![0u8; 4 * data.len().div_ceil(3)];
    let (_, written) = stream.encode(data, &mut out, true);
    out.truncate(written);
    String::from_utf8(out).expect("base64 alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(encode_all(b""), "");
    }

    #[test]
    fn single_byte_pads_two_equals() {
        assert_eq!(encode_all(b"M"), "TQ==");
    }

    #[test]
    fn two_bytes_pad_one_equals() {
        assert_eq!(encode_all(b"Ma"), "TWE=");
    }

    #[test]
    fn three_bytes_no_padding() {
        assert_eq!(encode_all(b"Man"), "TWFu");
    }

    #[test]
    fn known_vector() {
        assert_eq!(encode_all(b"Many hands make light work."), "TWFueSBoYW5kcyBtYWtlIGxpZ2h0IHdvcmsu");
    }

    #[test]
    fn arbitrary_output_chunk_size_resumes_correctly() {
        let data = b"Many hands make light work, and some heavy lifting too.";
        let expected = encode_all(data);

        for out_chunk in 1..=5 {
            let mut stream = Base64Stream::new();
            let mut result = Vec::new();
            let mut remaining = &data[..];
            loop {
                let mut out = vec![0u8; out_chunk];
                let (consumed, written) = stream.encode(remaining, &mut out, remaining.is_empty());
                result.extend_from_slice(&out[..written]);
                remaining = &remaining[consumed..];
                if consumed == 0 && written == 0 {
                    break;
                }
            }
            assert_eq!(String::from_utf8(result).unwrap(), expected, "out_chunk={out_chunk}");
        }
    }

    #[test]
    fn arbitrary_input_chunking_resumes_correctly() {
        let data = b"Many hands make light work, and some heavy lifting too.";
        let expected = encode_all(data);

        for in_chunk in 1..=7 {
            let mut stream = Base64Stream::new();
            let mut result = Vec::new();
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + in_chunk).min(data.len());
                let mut out = [0u8; 64];
                let (consumed, written) = stream.encode(&data[offset..end], &mut out, false);
                result.extend_from_slice(&out[..written]);
                offset += consumed;
            }
            let mut out = [0u8; 8];
            let (_, written) = stream.encode(&[], &mut out, true);
            result.extend_from_slice(&out[..written]);
            assert_eq!(String::from_utf8(result).unwrap(), expected, "in_chunk={in_chunk}");
        }
    }

    #[test]
    fn output_buffer_of_one_byte_still_makes_progress() {
        let data = b"xyz";
        let mut stream = Base64Stream::new();
        let mut result = Vec::new();
        let mut remaining = &data[..];
        loop {
            let mut out = [0u8; 1];
            let (consumed, written) = stream.encode(remaining, &mut out, remaining.is_empty());
            result.extend_from_slice(&out[..written]);
            remaining = &remaining[consumed..];
            if consumed == 0 && written == 0 && remaining.is_empty() {
                break;
            }
        }
        assert_eq!(String::from_utf8(result).unwrap(), encode_all(data));
    }

    proptest::proptest! {
        /// Whatever size the caller feeds input in, resuming `encode` across calls must decode
        /// back to the original bytes via an independent decoder.
        #[test]
        fn arbitrary_input_chunking_round_trips(
            data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
            in_chunk in 1usize..11,
        ) {
            let mut stream = Base64Stream::new();
            let mut result = Vec::new();
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + in_chunk).min(data.len());
                let mut out = vec![0u8; 64];
                let (consumed, written) = stream.encode(&data[offset..end], &mut out, false);
                result.extend_from_slice(&out[..written]);
                offset += consumed;
            }
            let mut out = [0u8; 8];
            let (_, written) = stream.encode(&[], &mut out, true);
            result.extend_from_slice(&out[..written]);

            let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &result).unwrap();
            proptest::prop_assert_eq!(decoded, data);
        }

        /// Whatever size the caller drains output in, the encoder must still produce the exact
        /// bytes a one-shot encode would, never losing or duplicating any of them.
        #[test]
        fn arbitrary_output_chunking_matches_one_shot(
            data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
            out_chunk in 1usize..11,
        ) {
            let expected = encode_all(&data);
            let mut stream = Base64Stream::new();
            let mut result = Vec::new();
            let mut remaining = &data[..];
            loop {
                let mut out = vec![0u8; out_chunk];
                let (consumed, written) = stream.encode(remaining, &mut out, remaining.is_empty());
                result.extend_from_slice(&out[..written]);
                remaining = &remaining[consumed..];
                if consumed == 0 && written == 0 {
                    break;
                }
            }
            proptest::prop_assert_eq!(String::from_utf8(result).unwrap(), expected);
        }
    }
}
