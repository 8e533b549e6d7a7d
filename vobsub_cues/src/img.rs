//! Run-length encoded image format for subtitles.
//!
//! The image is stored as two separate streams of scan lines: one for the
//! even rows and one for the odd rows.  Each stream is a sequence of
//! variable-length codes, 1 to 4 nibbles wide.  The low 2 bits of a code
//! are a color, and the rest is the run length.  A run length of 0 fills
//! to the end of the current row.  Every row starts on a byte boundary.

use crate::util::{HexPreview, NibbleCursor};

/// The dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Width in pixels.
    pub w: usize,
    /// Height in pixels.
    pub h: usize,
}

/// Read one run-length code, widening it one nibble at a time until it is
/// big enough to hold a run.  Returns `None` if the stream runs out.
fn read_code(nibbles: &mut NibbleCursor) -> Option<u16> {
    let mut value = u16::from(nibbles.read("run-length code").ok()?);
    for threshold in [0x4, 0x10, 0x40] {
        if value >= threshold {
            return Some(value);
        }
        value = value << 4 | u16::from(nibbles.read("run-length code").ok()?);
    }
    Some(value)
}

#[test]
fn read_codes_of_each_width() {
    // 1 nibble: run 1, color 1; then 2 nibbles: run 4, color 2.
    let mut nibbles = NibbleCursor::new(&[0x51, 0x20]);
    assert_eq!(read_code(&mut nibbles), Some(0x5));
    assert_eq!(read_code(&mut nibbles), Some(0x12));
    // 3 nibbles: run 16, color 3.
    let mut nibbles = NibbleCursor::new(&[0x04, 0x30]);
    assert_eq!(read_code(&mut nibbles), Some(0x043));
    // 4 nibbles: run 64, color 0, and a fill-to-end code.
    let mut nibbles = NibbleCursor::new(&[0x01, 0x00, 0x00, 0x02]);
    assert_eq!(read_code(&mut nibbles), Some(0x0100));
    assert_eq!(read_code(&mut nibbles), Some(0x0002));
    // Running out partway through a code.
    let mut nibbles = NibbleCursor::new(&[0x00]);
    assert_eq!(read_code(&mut nibbles), None);
}

/// Decode the scan lines starting at `first_row` and stepping by 2,
/// writing `colors[code & 3]` for each pixel.  Runs which extend past the
/// end of a row are clipped.  We stop when we run out of rows or data;
/// anything left undecoded stays zero.
fn decode_field<const N: usize>(
    data: &[u8],
    first_row: usize,
    size: Size,
    colors: &[[u8; N]; 4],
    out: &mut [u8],
) {
    let mut nibbles = NibbleCursor::new(data);
    let mut x = 0;
    let mut y = first_row;
    while y < size.h {
        let code = match read_code(&mut nibbles) {
            Some(code) => code,
            None => {
                trace!("scan line data ran out at row {}", y);
                break;
            }
        };
        let color = &colors[usize::from(code & 0x3)];
        let run = match usize::from(code >> 2) {
            0 => size.w - x,
            run => run,
        };
        let end = (x + run).min(size.w);
        let row = &mut out[y * size.w * N..(y + 1) * size.w * N];
        for px in row[x * N..end * N].chunks_exact_mut(N) {
            px.copy_from_slice(color);
        }
        x += run;
        if x >= size.w {
            x = 0;
            y += 2;
            nibbles.align();
        }
    }
}

/// Decompress a run-length encoded image, given the even and odd scan line
/// data.  Returns `N` bytes per pixel in row-major order, starting at the
/// upper-left.  `colors` maps each raw 2-bit code value to its pixel.
pub fn decompress<const N: usize>(size: Size, data: [&[u8]; 2], colors: &[[u8; N]; 4]) -> Vec<u8> {
    trace!("decompressing image {:?}, even: {:?}, odd: {:?}",
           size, HexPreview(data[0]), HexPreview(data[1]));
    let mut img = vec![0; size.w * size.h * N];
    decode_field(data[0], 0, size, colors, &mut img);
    decode_field(data[1], 1, size, colors, &mut img);
    img
}

#[cfg(test)]
const RAW: [[u8; 1]; 4] = [[0], [1], [2], [3]];

#[test]
fn decompress_interlaced_fields() {
    let size = Size { w: 3, h: 3 };
    // Row 0 is a single run of 1s followed by a padding nibble that must be
    // skipped, and row 2 fills to the end with 3s.
    let even = [0xdf, 0x00, 0x03];
    // Row 1 is [2, 0, 0].
    let odd = [0x68];
    let img = decompress(size, [&even[..], &odd[..]], &RAW);
    assert_eq!(img, vec![
        1, 1, 1,
        2, 0, 0,
        3, 3, 3,
    ]);
}

#[test]
fn long_runs_are_clipped_to_the_row() {
    let size = Size { w: 2, h: 2 };
    // A run of 5 in a 2-pixel row, twice; the second lands off the image.
    let img = decompress(size, [&[0x16, 0x16][..], &[0x1b][..]], &RAW);
    assert_eq!(img, vec![2, 2, 3, 3]);
}

#[test]
fn single_pixel_image() {
    let size = Size { w: 1, h: 1 };
    let colors = [[0, 0], [9, 9], [0, 0], [4, 4]];
    let img = decompress(size, [&[0x7f][..], &[][..]], &colors);
    assert_eq!(img, vec![4, 4]);
}

#[test]
fn missing_data_leaves_pixels_zero() {
    let size = Size { w: 2, h: 2 };
    let img = decompress(size, [&[0x04][..], &[][..]], &RAW);
    assert_eq!(img, vec![0, 0, 0, 0]);
}

#[test]
fn decoding_is_repeatable() {
    let size = Size { w: 3, h: 3 };
    let data = [&[0xdf, 0x00, 0x03][..], &[0x68][..]];
    assert_eq!(decompress(size, data, &RAW), decompress(size, data, &RAW));
}
