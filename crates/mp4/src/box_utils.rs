use bytes::Bytes;

use crate::{Mp4Error, Result};

/// Four-character box type code.
pub type FourCc = [u8; 4];

/// Size of a compact box header: 32-bit size + FourCC.
pub const BOX_HEADER_SIZE: usize = 8;

/// Maximum container nesting accepted before the input is treated as malformed.
pub const MAX_BOX_DEPTH: usize = 16;

/// Container box FourCCs whose bodies are parsed as child boxes.
///
/// Everything else is an opaque leaf (including `uuid` extension boxes).
pub const CONTAINER_BOXES: &[FourCc] = &[*b"moov", *b"moof", *b"traf"];

/// Returns `true` if boxes of this type are descended into.
#[inline]
pub fn is_container(fourcc: &FourCc) -> bool {
    CONTAINER_BOXES.contains(fourcc)
}

/// Parsed view over a single ISOBMFF box inside a parent byte range.
///
/// All offsets are absolute positions in the buffer the view was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxView {
    pub start: usize,
    pub end: usize,
    pub size: usize,
    pub fourcc: FourCc,
    pub body_start: usize,
    pub body_end: usize,
}

impl BoxView {
    /// Zero-copy slice of the box body (everything after the 8-byte header).
    pub fn body(&self, data: &Bytes) -> Bytes {
        data.slice(self.body_start..self.body_end)
    }

    #[inline]
    pub fn body_len(&self) -> usize {
        self.body_end - self.body_start
    }
}

/// Read a raw box header: returns `(declared_size, fourcc)` without validating it.
pub fn read_box_header(data: &[u8]) -> Option<(u32, FourCc)> {
    if data.len() < BOX_HEADER_SIZE {
        return None;
    }

    let size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let fourcc: FourCc = [data[4], data[5], data[6], data[7]];
    Some((size, fourcc))
}

/// Parse a single box located at `offset` within `[..end)`.
///
/// Fails with [`Mp4Error::MalformedBox`] when the header is cut short, when
/// the declared size is below the header size (this includes the 64-bit
/// `size == 1` and to-end-of-file `size == 0` encodings, which are not
/// supported) or when the box would extend past `end`.
pub fn box_at(data: &[u8], offset: usize, end: usize) -> Result<BoxView> {
    let end = end.min(data.len());
    if offset >= end {
        return Err(Mp4Error::MalformedBox {
            fourcc: [0; 4],
            offset,
            reason: "no bytes left for a box header",
        });
    }

    let Some((size, fourcc)) = read_box_header(&data[offset..end]) else {
        return Err(Mp4Error::MalformedBox {
            fourcc: [0; 4],
            offset,
            reason: "truncated box header",
        });
    };

    let reason = match size {
        0 => Some("size 0 (box extends to end of file) is not supported"),
        1 => Some("64-bit extended box size is not supported"),
        s if (s as usize) < BOX_HEADER_SIZE => Some("declared size smaller than box header"),
        s if offset + s as usize > end => Some("declared size exceeds available bytes"),
        _ => None,
    };
    if let Some(reason) = reason {
        return Err(Mp4Error::MalformedBox {
            fourcc,
            offset,
            reason,
        });
    }

    let size = size as usize;
    Ok(BoxView {
        start: offset,
        end: offset + size,
        size,
        fourcc,
        body_start: offset + BOX_HEADER_SIZE,
        body_end: offset + size,
    })
}

/// Iterator over sibling boxes in `[start..end)`.
///
/// Yields at most one error, after which it is exhausted.
#[derive(Debug, Clone)]
pub struct BoxIter<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    failed: bool,
}

impl Iterator for BoxIter<'_> {
    type Item = Result<BoxView>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }

        match box_at(self.data, self.offset, self.end) {
            Ok(parsed) => {
                self.offset = parsed.end;
                Some(Ok(parsed))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterate over the sibling boxes laid out in `[start..end)`.
pub fn boxes(data: &[u8], start: usize, end: usize) -> BoxIter<'_> {
    BoxIter {
        data,
        offset: start,
        end: end.min(data.len()),
        failed: false,
    }
}

/// Find the first child box with the given FourCC inside `[start..end)`.
///
/// Siblings preceding the match must be well formed; siblings after it are not read.
pub fn find_first_box(
    data: &[u8],
    start: usize,
    end: usize,
    target: FourCc,
) -> Result<Option<BoxView>> {
    for parsed in boxes(data, start, end) {
        let parsed = parsed?;
        if parsed.fourcc == target {
            return Ok(Some(parsed));
        }
    }

    Ok(None)
}

/// Resolve a box path such as `moof/traf/tfhd` and return the payload of the
/// first box (in document order) matching the whole path.
///
/// Only [`CONTAINER_BOXES`] are descended into.
pub fn find_box_path(data: &Bytes, path: &[FourCc]) -> Result<Bytes> {
    match find_path_in(data, 0, data.len(), path, 0)? {
        Some(view) => Ok(view.body(data)),
        None => Err(Mp4Error::BoxPathNotFound {
            path: path_to_string(path),
        }),
    }
}

fn find_path_in(
    data: &[u8],
    start: usize,
    end: usize,
    path: &[FourCc],
    depth: usize,
) -> Result<Option<BoxView>> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(None);
    };
    if depth >= MAX_BOX_DEPTH {
        return Err(Mp4Error::MalformedBox {
            fourcc: *head,
            offset: start,
            reason: "box nesting exceeds maximum depth",
        });
    }

    for parsed in boxes(data, start, end) {
        let parsed = parsed?;
        if parsed.fourcc != *head {
            continue;
        }
        if rest.is_empty() {
            return Ok(Some(parsed));
        }
        if is_container(&parsed.fourcc)
            && let Some(found) =
                find_path_in(data, parsed.body_start, parsed.body_end, rest, depth + 1)?
        {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

pub fn fourcc_to_string(fourcc: &FourCc) -> String {
    fourcc
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

/// Render a box path as `moof/traf/trun`.
pub fn path_to_string(path: &[FourCc]) -> String {
    path.iter()
        .map(fourcc_to_string)
        .collect::<Vec<_>>()
        .join("/")
}
