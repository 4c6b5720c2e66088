//! Revision accounting for incrementally updated PDFs.
//!
//! Every incremental update appends a new body, cross-reference section and
//! trailer ending in `startxref <offset> %%EOF`. Scanning the file for those
//! markers recovers where each revision ends, which is enough to tell which
//! revision a signature's ByteRange covers and whether anything was appended
//! after it.

use lazy_static::lazy_static;
use serde::Serialize;

lazy_static! {
    /// Regex for "startxref N %%EOF" trailer markers, including the end-of-line after %%EOF
    static ref RE_EOF_MARKER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"startxref\s+(\d+)\s+%%EOF(\r\n|\r|\n)?").unwrap();
}

/// End offsets of each revision of a document, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionHistory {
    ends: Vec<usize>,
}

impl RevisionHistory {
    /// Build a history from known revision end offsets.
    pub fn from_ends(mut ends: Vec<usize>) -> Self {
        ends.sort_unstable();
        ends.dedup();
        Self { ends }
    }

    /// Scan raw document bytes for revision boundaries.
    ///
    /// A linearized file starts with a first-page section whose trailer reads
    /// `startxref 0`; that marker does not close a revision and is skipped.
    /// Whitespace after the final marker belongs to the last revision.
    pub fn scan(data: &[u8]) -> Self {
        let mut ends = Vec::new();
        for capture in RE_EOF_MARKER.captures_iter(data) {
            let (Some(full), Some(offset)) = (capture.get(0), capture.get(1)) else {
                continue;
            };
            let is_zero = offset.as_bytes().iter().all(|b| *b == b'0');
            if is_zero {
                log::debug!("Skipping startxref 0 marker at {}", full.start());
                continue;
            }
            ends.push(full.end());
        }

        if let Some(last) = ends.last_mut() {
            let trailing = &data[*last..];
            if trailing
                .iter()
                .all(|b| b.is_ascii_whitespace() || *b == 0)
            {
                *last = data.len();
            }
        }

        log::debug!("Found {} revision(s) in {} bytes", ends.len(), data.len());
        Self { ends }
    }

    /// End offsets (exclusive), oldest first.
    pub fn ends(&self) -> &[usize] {
        &self.ends
    }

    /// Number of revisions found. Zero if the scan found no trailer markers.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// True if no trailer markers were found.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }
}

/// Where a signature sits in the document's update history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevisionInfo {
    /// 1-based revision the signature covers; `None` when it cannot be determined
    pub revision: Option<u32>,
    /// Total number of revisions in the document
    pub total_revisions: u32,
    /// True if the signed region extends to the end of the file
    pub covers_whole_document: bool,
}

/// Maps signatures onto revisions.
pub struct RevisionAccountant;

impl RevisionAccountant {
    /// Locate the revision covered by a signature whose signed region ends at
    /// `signed_end`.
    ///
    /// The revision is the oldest one whose end offset is at or after the end
    /// of the signed region. A document without trailer markers is treated as
    /// a single revision of unknown index.
    pub fn locate(history: &RevisionHistory, signed_end: usize, file_len: usize) -> RevisionInfo {
        let covers_whole_document = signed_end == file_len;
        if history.is_empty() {
            log::debug!(
                "No revision markers; revision of signature ending at {} unknown",
                signed_end
            );
            return RevisionInfo {
                revision: None,
                total_revisions: 1,
                covers_whole_document,
            };
        }

        let total = u32::try_from(history.len()).unwrap_or(u32::MAX);
        let revision = history
            .ends()
            .iter()
            .position(|end| *end >= signed_end)
            .and_then(|index| u32::try_from(index + 1).ok());

        if revision.is_none() {
            log::warn!(
                "Signed region ends at {} after the last revision marker",
                signed_end
            );
        }

        RevisionInfo {
            revision,
            total_revisions: total,
            covers_whole_document,
        }
    }
}
