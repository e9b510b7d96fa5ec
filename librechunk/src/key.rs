//! Textual box keys: `(o1,o2,...)(l1,l2,...)`.
//!
//! Keys name record boxes in input files and sub-block boxes in artifacts.
//! The key is always stored in its own length-prefixed field (see
//! [`crate::record`]), so decoding never has to search payload bytes for a
//! closing bracket.

use std::fmt::Write;

use crate::error::FormatError;

/// Encodes an offset/length pair. Both slices are expected to have the same length.
pub fn encode(offset: &[i64], length: &[i64]) -> String {
    let mut out = String::with_capacity(4 + 8 * (offset.len() + length.len()));
    push_vector(&mut out, offset);
    push_vector(&mut out, length);
    out
}

fn push_vector(out: &mut String, values: &[i64]) {
    out.push('(');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing into a String cannot fail.
        let _ = write!(out, "{v}");
    }
    out.push(')');
}

/// Decodes a key produced by [`encode`].
///
/// Whitespace around elements is tolerated; anything else outside the two
/// bracket groups is rejected.
pub fn decode(text: &str) -> Result<(Vec<i64>, Vec<i64>), FormatError> {
    let (offset, rest) = take_vector(text, text, 0)?;
    let consumed = text.len() - rest.len();
    let (length, rest) = take_vector(text, rest, consumed)?;
    if !rest.trim().is_empty() {
        return Err(FormatError::TrailingInput(text.to_string()));
    }
    if offset.len() != length.len() {
        return Err(FormatError::LengthMismatch {
            offset: offset.len(),
            length: length.len(),
        });
    }
    Ok((offset, length))
}

/// Parses one `( ... )` group at the start of `input` and returns the rest.
fn take_vector<'a>(
    text: &str,
    input: &'a str,
    position: usize,
) -> Result<(Vec<i64>, &'a str), FormatError> {
    let body = input
        .strip_prefix('(')
        .ok_or_else(|| FormatError::MissingBracket {
            text: text.to_string(),
            position,
            expected: '(',
        })?;
    let close = body.find(')').ok_or_else(|| FormatError::MissingBracket {
        text: text.to_string(),
        position: position + input.len(),
        expected: ')',
    })?;
    let inner = &body[..close];
    if inner.contains('(') {
        return Err(FormatError::MissingBracket {
            text: text.to_string(),
            position: position + 1 + close,
            expected: ')',
        });
    }
    if inner.trim().is_empty() {
        return Err(FormatError::EmptyVector(text.to_string()));
    }
    let values = inner
        .split(',')
        .map(|element| {
            let element = element.trim();
            element
                .parse::<i64>()
                .map_err(|_| FormatError::InvalidElement(element.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((values, &body[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{TestResult, quickcheck};

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode(&[0, 32, 64], &[32, 32, 16]), "(0,32,64)(32,32,16)");
        assert_eq!(encode(&[-4], &[7]), "(-4)(7)");
    }

    #[test]
    fn test_decode_simple() {
        let (o, l) = decode("(16,16)(32,32)").unwrap();
        assert_eq!(o, vec![16, 16]);
        assert_eq!(l, vec![32, 32]);
    }

    #[test]
    fn test_decode_tolerates_spaces() {
        let (o, l) = decode("( 1, 2 )(3 ,4)").unwrap();
        assert_eq!(o, vec![1, 2]);
        assert_eq!(l, vec![3, 4]);
    }

    #[test]
    fn test_decode_rejects_malformed_brackets() {
        assert!(matches!(
            decode("16,16)(32,32)"),
            Err(FormatError::MissingBracket { expected: '(', .. })
        ));
        assert!(matches!(
            decode("(16,16(32,32)"),
            Err(FormatError::MissingBracket { expected: ')', .. })
        ));
        assert!(matches!(
            decode("(16,16)(32,32"),
            Err(FormatError::MissingBracket { expected: ')', .. })
        ));
        assert!(matches!(
            decode("(16,16)"),
            Err(FormatError::MissingBracket { expected: '(', .. })
        ));
    }

    #[test]
    fn test_decode_rejects_mismatch_and_garbage() {
        assert_eq!(
            decode("(1,2,3)(4,5)"),
            Err(FormatError::LengthMismatch {
                offset: 3,
                length: 2
            })
        );
        assert_eq!(
            decode("(1,x)(4,5)"),
            Err(FormatError::InvalidElement("x".to_string()))
        );
        assert_eq!(
            decode("(1,2)(4,5)junk"),
            Err(FormatError::TrailingInput("(1,2)(4,5)junk".to_string()))
        );
        assert!(matches!(decode("()(1)"), Err(FormatError::EmptyVector(_))));
        assert!(matches!(
            decode("(1,)(1,2)"),
            Err(FormatError::InvalidElement(_))
        ));
    }

    quickcheck! {
        fn prop_round_trip(pairs: Vec<(i64, i64)>) -> TestResult {
            if pairs.is_empty() {
                return TestResult::discard();
            }
            let (offset, length): (Vec<i64>, Vec<i64>) = pairs.into_iter().unzip();
            let decoded = decode(&encode(&offset, &length));
            TestResult::from_bool(decoded == Ok((offset, length)))
        }
    }
}
