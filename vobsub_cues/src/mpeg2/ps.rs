//! # MPEG-2 Program Streams (PS)
//!
//! This is the container format used at the top-level of a `*.sub` file.
//! Program Stream packs have no length field, so we find their boundaries
//! by searching for the pack start code.

/// The start code which begins every pack.
pub const PACK_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xba];

/// A single pack, from its start code up to (but not including) the next
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pack<'a> {
    /// Byte offset of the start code within the `*.sub` data.
    pub offset: u64,
    /// The pack, including its start code and header.
    pub payload: &'a [u8],
}

/// An iterator over all the packs in an MPEG-2 Program Stream.
#[derive(Debug, Clone)]
pub struct Packs<'a> {
    /// The entire input, so we can compute offsets.
    input: &'a [u8],
    /// The start of the next pack, if any.
    next_start: Option<usize>,
}

/// Find the next pack start code at or after `from`.
fn find_start_code(input: &[u8], from: usize) -> Option<usize> {
    if from >= input.len() {
        return None;
    }
    input[from..]
        .windows(PACK_START_CODE.len())
        .position(|window| window == PACK_START_CODE)
        .map(|pos| from + pos)
}

impl<'a> Iterator for Packs<'a> {
    type Item = Pack<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        // Skip past our own start code before searching for the next one.
        self.next_start = find_start_code(self.input, start + PACK_START_CODE.len());
        let end = self.next_start.unwrap_or(self.input.len());
        trace!("found pack at 0x{:x}, 0x{:x} bytes", start, end - start);
        Some(Pack {
            offset: start as u64,
            payload: &self.input[start..end],
        })
    }
}

/// Iterate over the packs in an MPEG-2 Program Stream.  Any data before the
/// first start code is ignored, and the last pack runs to the end of the
/// input.
pub fn packs(input: &[u8]) -> Packs {
    Packs {
        input,
        next_start: find_start_code(input, 0),
    }
}

#[test]
fn no_start_code_means_no_packs() {
    assert_eq!(packs(&[]).count(), 0);
    assert_eq!(packs(&[0x00, 0x00, 0x01]).count(), 0);
    assert_eq!(packs(&[0x00, 0x00, 0x01, 0xbd, 0x00, 0x00]).count(), 0);
}

#[test]
fn single_pack_runs_to_end_of_input() {
    let input = [0xff, 0x00, 0x00, 0x01, 0xba, 0x44, 0x55];
    let found: Vec<Pack> = packs(&input).collect();
    assert_eq!(found, vec![Pack { offset: 1, payload: &input[1..] }]);
}

#[test]
fn packs_split_at_each_start_code() {
    let input = [
        0x00, 0x00, 0x01, 0xba, 0x01,
        0x00, 0x00, 0x01, 0xba,
        0x00, 0x00, 0x01, 0xba, 0x02, 0x03,
    ];
    let found: Vec<Pack> = packs(&input).collect();
    assert_eq!(found.len(), 3);
    assert_eq!(found[0], Pack { offset: 0, payload: &input[0..5] });
    assert_eq!(found[1], Pack { offset: 5, payload: &input[5..9] });
    assert_eq!(found[2], Pack { offset: 9, payload: &input[9..] });
}
