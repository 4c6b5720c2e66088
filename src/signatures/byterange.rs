//! ByteRange extraction for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is a flat array of `(offset, length)` pairs. Every writer in
//! practice emits two pairs:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to the end of the signed revision
//!
//! The gap between the pairs holds the hex-encoded `/Contents` value within
//! `<` and `>` delimiters. The values come straight from the file and are
//! untrusted, so every offset is validated with checked arithmetic before any
//! byte is read.

use std::ops::Range;

use crate::error::{Error, Result};

/// A validated ByteRange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRange {
    ranges: Vec<Range<usize>>,
}

impl ByteRange {
    /// Validate a raw `/ByteRange` array against the physical file length.
    ///
    /// Rejects odd or empty arrays, negative values, ranges that are not in
    /// strictly increasing order, overlapping ranges and ranges extending past
    /// the end of the file.
    pub fn parse(values: &[i64], file_len: usize) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::MalformedByteRange("empty array".to_string()));
        }
        if values.len() % 2 != 0 {
            return Err(Error::MalformedByteRange(format!(
                "odd number of entries ({})",
                values.len()
            )));
        }

        let mut ranges: Vec<Range<usize>> = Vec::with_capacity(values.len() / 2);
        for (index, pair) in values.chunks_exact(2).enumerate() {
            let offset = usize::try_from(pair[0]).map_err(|_| {
                Error::MalformedByteRange(format!("negative offset {} in pair {}", pair[0], index))
            })?;
            let length = usize::try_from(pair[1]).map_err(|_| {
                Error::MalformedByteRange(format!("negative length {} in pair {}", pair[1], index))
            })?;
            let end = offset.checked_add(length).ok_or_else(|| {
                Error::MalformedByteRange(format!(
                    "pair {} overflows: {} + {}",
                    index, offset, length
                ))
            })?;

            if end > file_len {
                return Err(Error::MalformedByteRange(format!(
                    "range {}..{} exceeds file size {}",
                    offset, end, file_len
                )));
            }

            if let Some(previous) = ranges.last() {
                if offset <= previous.start {
                    return Err(Error::MalformedByteRange(format!(
                        "offsets not increasing: {} after {}",
                        offset, previous.start
                    )));
                }
                if offset < previous.end {
                    return Err(Error::MalformedByteRange(format!(
                        "range {}..{} overlaps {}..{}",
                        offset, end, previous.start, previous.end
                    )));
                }
            }

            ranges.push(offset..end);
        }

        if ranges[0].start != 0 {
            log::warn!("ByteRange does not start at offset 0 (starts at {})", ranges[0].start);
        }

        Ok(Self { ranges })
    }

    /// The validated ranges, in file order.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Exclusive end offset of the signed region.
    pub fn end(&self) -> usize {
        self.ranges.last().map(|r| r.end).unwrap_or(0)
    }

    /// Total number of signed bytes.
    pub fn signed_len(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    /// True if the signed region reaches the last byte of the file.
    pub fn covers_whole_document(&self, file_len: usize) -> bool {
        self.end() == file_len
    }

    /// Regions between consecutive ranges (the excluded placeholders).
    pub fn gaps(&self) -> Vec<Range<usize>> {
        self.ranges
            .windows(2)
            .filter(|w| w[0].end < w[1].start)
            .map(|w| w[0].end..w[1].start)
            .collect()
    }

    /// Check that the first gap is exactly a `<...>` hex string.
    ///
    /// A ByteRange that excludes more (or less) than the `/Contents` value
    /// leaves bytes unsigned or signs over the signature itself.
    pub fn gap_is_contents_string(&self, data: &[u8]) -> bool {
        let Some(gap) = self.gaps().into_iter().next() else {
            return false;
        };
        match data.get(gap) {
            Some(bytes) if bytes.len() >= 2 => {
                bytes[0] == b'<'
                    && bytes[bytes.len() - 1] == b'>'
                    && bytes[1..bytes.len() - 1]
                        .iter()
                        .all(|b| b.is_ascii_hexdigit() || b.is_ascii_whitespace())
            },
            _ => false,
        }
    }

    /// Concatenate the signed ranges of `data`.
    pub fn extract(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut signed = Vec::with_capacity(self.signed_len());
        for range in &self.ranges {
            let bytes = data.get(range.clone()).ok_or_else(|| {
                Error::MalformedByteRange(format!(
                    "range {}..{} exceeds file size {}",
                    range.start,
                    range.end,
                    data.len()
                ))
            })?;
            signed.extend_from_slice(bytes);
        }
        Ok(signed)
    }
}

/// The bytes covered by one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRegion {
    /// Validated ByteRange
    pub byte_range: ByteRange,
    /// Concatenation of the signed ranges
    pub bytes: Vec<u8>,
    /// True if the signed region ends at the end of the file
    pub covers_whole_document: bool,
}

/// Validate a `/ByteRange` and extract the signed bytes from the document.
pub fn extract_signed_region(values: &[i64], data: &[u8]) -> Result<SignedRegion> {
    let byte_range = ByteRange::parse(values, data.len())?;
    if !byte_range.gap_is_contents_string(data) {
        log::warn!(
            "ByteRange {:?} does not exclude exactly the /Contents string",
            byte_range.ranges()
        );
    }
    let bytes = byte_range.extract(data)?;
    let covers_whole_document = byte_range.covers_whole_document(data.len());
    log::debug!(
        "Extracted {} signed bytes, end {} of {}",
        bytes.len(),
        byte_range.end(),
        data.len()
    );
    Ok(SignedRegion {
        byte_range,
        bytes,
        covers_whole_document,
    })
}
