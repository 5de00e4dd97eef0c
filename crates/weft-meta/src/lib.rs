// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Micro-compression for type/namespace names embedded in weft streams.
//!
//! Identifier-shaped strings come from narrow alphabets, so they pack well
//! below one byte per character:
//!
//! | encoding                  | wire | bits/char | alphabet                |
//! |---------------------------|------|-----------|-------------------------|
//! | `Utf8`                    | 0x00 | 8         | anything                |
//! | `LowerSpecial`            | 0x01 | 5         | `a-z . _ $ \|`          |
//! | `LowerUpperDigitSpecial`  | 0x02 | 6         | `a-z A-Z 0-9 . _`       |
//! | `FirstToLowerSpecial`     | 0x03 | 5         | first char upper, rest lower-special |
//! | `AllToLowerSpecial`       | 0x04 | 5         | upper chars escaped as `\|` + lower |
//!
//! Packed forms reserve **bit 7 of byte 0** as the strip-last-char flag: set
//! when the final 5/6-bit group is padding rather than a real character.
//!
//! [`encode`] runs one statistics pass and picks the smallest applicable
//! encoding; [`decode`] is the exact inverse. The engine stores the result
//! as a [`MetaString`] and writes `encoding byte + packed bytes` on the wire
//! (framing is the engine's concern, not this crate's).

mod pack;

use pack::{pack_bits, unpack_bits};

/// Longest name this codec accepts, in characters.
pub const MAX_NAME_LEN: usize = 32767;

const BITS_LOWER: u32 = 5;
const BITS_LOWER_UPPER_DIGIT: u32 = 6;

/// Escape character marking an uppercase letter in `AllToLowerSpecial`.
const UPPER_ESCAPE: char = '|';

/// Wire encodings for packed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetaEncoding {
    /// Plain UTF-8 bytes; the fallback for anything outside the packed
    /// alphabets.
    Utf8 = 0x00,
    /// 5 bits/char over `a-z . _ $ |`.
    LowerSpecial = 0x01,
    /// 6 bits/char over `a-z A-Z 0-9 . _`.
    LowerUpperDigitSpecial = 0x02,
    /// `LowerSpecial` after lowering the leading character.
    FirstToLowerSpecial = 0x03,
    /// `LowerSpecial` after escaping every uppercase char as `|` + lower.
    AllToLowerSpecial = 0x04,
}

impl MetaEncoding {
    /// Parses a wire byte.
    pub fn from_wire(byte: u8) -> Result<Self, MetaStringError> {
        match byte {
            0x00 => Ok(Self::Utf8),
            0x01 => Ok(Self::LowerSpecial),
            0x02 => Ok(Self::LowerUpperDigitSpecial),
            0x03 => Ok(Self::FirstToLowerSpecial),
            0x04 => Ok(Self::AllToLowerSpecial),
            other => Err(MetaStringError::UnknownEncoding(other)),
        }
    }

    /// The byte this encoding writes on the wire.
    #[inline]
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// A name together with its chosen encoding and packed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaString {
    text: String,
    encoding: MetaEncoding,
    bytes: Vec<u8>,
}

impl MetaString {
    /// The original text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The chosen encoding.
    pub fn encoding(&self) -> MetaEncoding {
        self.encoding
    }

    /// The packed bytes as written on the wire.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the final packed group is padding (bit 7 of byte 0).
    pub fn strip_last_char(&self) -> bool {
        self.encoding != MetaEncoding::Utf8
            && self.bytes.first().is_some_and(|b| b & 0x80 != 0)
    }
}

/// Errors from encoding or decoding a packed name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaStringError {
    /// Input exceeds [`MAX_NAME_LEN`].
    #[error("name too long: {0} chars exceeds max {MAX_NAME_LEN}")]
    TooLong(usize),

    /// A character has no value in the requested packed alphabet.
    #[error("character {0:?} is outside the {1:?} alphabet")]
    OutsideAlphabet(char, MetaEncoding),

    /// A packed value decodes to nothing in the alphabet.
    #[error("packed value {0} is outside the {1:?} alphabet")]
    BadPackedValue(u8, MetaEncoding),

    /// The wire named an encoding this codec does not know.
    #[error("unknown meta-string encoding byte {0:#04x}")]
    UnknownEncoding(u8),

    /// UTF-8 fallback bytes were not valid UTF-8.
    #[error("meta-string UTF-8 payload is not valid UTF-8")]
    BadUtf8,
}

/// Character statistics driving encoding selection. One pass, computed once.
struct NameStats {
    digit_count: usize,
    upper_count: usize,
    fits_lower_upper_digit: bool,
    fits_lower: bool,
}

fn compute_stats(input: &str) -> NameStats {
    let mut stats = NameStats {
        digit_count: 0,
        upper_count: 0,
        fits_lower_upper_digit: true,
        fits_lower: true,
    };
    for c in input.chars() {
        if stats.fits_lower_upper_digit
            && !(c.is_ascii_lowercase()
                || c.is_ascii_uppercase()
                || c.is_ascii_digit()
                || matches!(c, '.' | '_'))
        {
            stats.fits_lower_upper_digit = false;
        }
        if stats.fits_lower && !(c.is_ascii_lowercase() || matches!(c, '.' | '_' | '$' | '|')) {
            stats.fits_lower = false;
        }
        if c.is_ascii_digit() {
            stats.digit_count += 1;
        }
        if c.is_ascii_uppercase() {
            stats.upper_count += 1;
        }
    }
    stats
}

/// Picks the smallest applicable encoding for `input`.
///
/// Selection mirrors the cross-language rule: prefer pure 5-bit, then weigh
/// the escape cost of `AllToLowerSpecial` against flat 6-bit packing.
pub fn choose_encoding(input: &str) -> MetaEncoding {
    if input.is_empty() || !input.is_ascii() {
        return MetaEncoding::Utf8;
    }
    let stats = compute_stats(input);
    if stats.fits_lower {
        return MetaEncoding::LowerSpecial;
    }
    if stats.fits_lower_upper_digit {
        if stats.digit_count != 0 {
            return MetaEncoding::LowerUpperDigitSpecial;
        }
        if stats.upper_count == 1 && input.starts_with(|c: char| c.is_ascii_uppercase()) {
            return MetaEncoding::FirstToLowerSpecial;
        }
        if (input.len() + stats.upper_count) * 5 < input.len() * 6 {
            return MetaEncoding::AllToLowerSpecial;
        }
        return MetaEncoding::LowerUpperDigitSpecial;
    }
    MetaEncoding::Utf8
}

/// Encodes `input`, choosing the smallest applicable encoding.
pub fn encode(input: &str) -> Result<MetaString, MetaStringError> {
    encode_with(input, choose_encoding(input))
}

/// Encodes `input` with a caller-chosen encoding.
pub fn encode_with(input: &str, encoding: MetaEncoding) -> Result<MetaString, MetaStringError> {
    if input.is_empty() {
        // Empty names carry no packed payload; they always travel as UTF-8.
        return Ok(MetaString {
            text: String::new(),
            encoding: MetaEncoding::Utf8,
            bytes: Vec::new(),
        });
    }
    if input.chars().count() > MAX_NAME_LEN {
        return Err(MetaStringError::TooLong(input.chars().count()));
    }
    let bytes = match encoding {
        MetaEncoding::Utf8 => input.as_bytes().to_vec(),
        MetaEncoding::LowerSpecial => pack_lower(input.chars(), encoding)?,
        MetaEncoding::FirstToLowerSpecial => {
            let mut chars = input.chars();
            let lowered = chars
                .next()
                .map(|c| c.to_ascii_lowercase())
                .into_iter()
                .chain(chars);
            pack_lower(lowered, encoding)?
        }
        MetaEncoding::AllToLowerSpecial => {
            let mut escaped = Vec::with_capacity(input.len());
            for c in input.chars() {
                if c.is_ascii_uppercase() {
                    escaped.push(UPPER_ESCAPE);
                    escaped.push(c.to_ascii_lowercase());
                } else {
                    escaped.push(c);
                }
            }
            pack_lower(escaped.into_iter(), encoding)?
        }
        MetaEncoding::LowerUpperDigitSpecial => {
            let values = input
                .chars()
                .map(|c| lower_upper_digit_value(c).ok_or(MetaStringError::OutsideAlphabet(c, encoding)))
                .collect::<Result<Vec<u8>, _>>()?;
            pack_bits(&values, BITS_LOWER_UPPER_DIGIT)
        }
    };
    Ok(MetaString { text: input.to_owned(), encoding, bytes })
}

/// Decodes packed `bytes` produced with `encoding`.
pub fn decode(bytes: &[u8], encoding: MetaEncoding) -> Result<String, MetaStringError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    match encoding {
        MetaEncoding::Utf8 => {
            String::from_utf8(bytes.to_vec()).map_err(|_| MetaStringError::BadUtf8)
        }
        MetaEncoding::LowerSpecial => unpack_lower(bytes, encoding),
        MetaEncoding::FirstToLowerSpecial => {
            let mut s = unpack_lower(bytes, encoding)?;
            if let Some(first) = s.get(..1) {
                let upper = first.to_ascii_uppercase();
                s.replace_range(..1, &upper);
            }
            Ok(s)
        }
        MetaEncoding::AllToLowerSpecial => {
            let escaped = unpack_lower(bytes, encoding)?;
            let mut out = String::with_capacity(escaped.len());
            let mut escape_next = false;
            for c in escaped.chars() {
                if escape_next {
                    out.push(c.to_ascii_uppercase());
                    escape_next = false;
                } else if c == UPPER_ESCAPE {
                    escape_next = true;
                } else {
                    out.push(c);
                }
            }
            Ok(out)
        }
        MetaEncoding::LowerUpperDigitSpecial => {
            let values = unpack_bits(bytes, BITS_LOWER_UPPER_DIGIT);
            values
                .into_iter()
                .map(|v| {
                    lower_upper_digit_char(v)
                        .ok_or(MetaStringError::BadPackedValue(v, encoding))
                })
                .collect()
        }
    }
}

fn pack_lower(
    chars: impl Iterator<Item = char>,
    encoding: MetaEncoding,
) -> Result<Vec<u8>, MetaStringError> {
    let values = chars
        .map(|c| lower_value(c).ok_or(MetaStringError::OutsideAlphabet(c, encoding)))
        .collect::<Result<Vec<u8>, _>>()?;
    Ok(pack_bits(&values, BITS_LOWER))
}

fn unpack_lower(bytes: &[u8], encoding: MetaEncoding) -> Result<String, MetaStringError> {
    unpack_bits(bytes, BITS_LOWER)
        .into_iter()
        .map(|v| lower_char(v).ok_or(MetaStringError::BadPackedValue(v, encoding)))
        .collect()
}

fn lower_value(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        '.' => Some(26),
        '_' => Some(27),
        '$' => Some(28),
        '|' => Some(29),
        _ => None,
    }
}

fn lower_char(v: u8) -> Option<char> {
    match v {
        0..=25 => Some((b'a' + v) as char),
        26 => Some('.'),
        27 => Some('_'),
        28 => Some('$'),
        29 => Some('|'),
        _ => None,
    }
}

fn lower_upper_digit_value(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        'A'..='Z' => Some(c as u8 - b'A' + 26),
        '0'..='9' => Some(c as u8 - b'0' + 52),
        '.' => Some(62),
        '_' => Some(63),
        _ => None,
    }
}

fn lower_upper_digit_char(v: u8) -> Option<char> {
    match v {
        0..=25 => Some((b'a' + v) as char),
        26..=51 => Some((b'A' + v - 26) as char),
        52..=61 => Some((b'0' + v - 52) as char),
        62 => Some('.'),
        63 => Some('_'),
        _ => None,
    }
}
