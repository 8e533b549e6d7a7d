//! # Subtitle packet decoding.
//!
//! A subtitle packet starts with a 4-byte header: the total size of the
//! packet, and the offset of the first control sequence.  The run-length
//! encoded image sits between the header and the control sequences.

use image::{ImageBuffer, Rgba, RgbaImage};
use std::fmt;

use crate::config::DecoderConfig;
use crate::control::{parse_control, Control};
use crate::errors::{Error, Result};
use crate::idx::Palette;
use crate::img::{decompress, Size};
use crate::util::ByteCursor;

/// Size of the header at the start of each subtitle packet.
const HEADER_LEN: usize = 4;

/// A decoded subtitle, ready to be drawn.
#[derive(Clone, PartialEq)]
pub struct DecodedSubtitle {
    begin: f64,
    end: Option<f64>,
    force: bool,
    origin: (i32, i32),
    extent: (u32, u32),
    pixels: Vec<u8>,
}

impl DecodedSubtitle {
    /// Start time of subtitle, in seconds.
    pub fn begin(&self) -> f64 {
        self.begin
    }

    /// End time of subtitle, in seconds.  This may be missing from certain
    /// subtitles, in which case the subtitle stays up indefinitely.
    pub fn end(&self) -> Option<f64> {
        self.end
    }

    /// Should this subtitle be shown even when subtitles are off?
    pub fn force(&self) -> bool {
        self.force
    }

    /// The position of the upper-left corner of the subtitle.
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// The width and height of the subtitle.
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// RGBA pixels, 4 bytes per pixel, in row-major order starting at the
    /// upper-left.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Is this subtitle visible at `time`?
    pub fn contains(&self, time: f64) -> bool {
        self.begin <= time && time < self.end.unwrap_or(f64::INFINITY)
    }

    /// Copy the subtitle into an RGBA image.
    pub fn to_image(&self) -> RgbaImage {
        let (width, height) = self.extent;
        ImageBuffer::from_fn(width, height, |x, y| {
            let offset = cast::usize((y * width + x) * 4);
            let px = &self.pixels[offset..offset + 4];
            Rgba([px[0], px[1], px[2], px[3]])
        })
    }

    /// Shift this subtitle to an absolute time and position.
    pub(crate) fn shifted(mut self, seconds: f64, (dx, dy): (i32, i32)) -> Self {
        self.begin += seconds;
        self.end = self.end.map(|end| end + seconds);
        self.origin = (self.origin.0 + dx, self.origin.1 + dy);
        self
    }
}

impl fmt::Debug for DecodedSubtitle {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DecodedSubtitle")
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("force", &self.force)
            .field("origin", &self.origin)
            .field("extent", &self.extent)
            .finish()
    }
}

/// Read the packet header and control sequences, and locate the two
/// halves of the image.
fn parse_packet<'a>(
    packet: &'a [u8],
    config: &DecoderConfig,
) -> Result<(Control, [&'a [u8]; 2])> {
    let mut cursor = ByteCursor::new(packet);
    let declared = usize::from(cursor.read_be_u16("subtitle size")?);
    let data_packet_size = usize::from(cursor.read_be_u16("data packet size")?);

    let packet = if !config.check_subtitle_size() || declared == packet.len() {
        packet
    } else if declared > packet.len() {
        return Err(Error::SizeMismatch {
            declared,
            actual: packet.len(),
        });
    } else {
        warn!("found 0x{:x} bytes of data in subtitle packet, wanted 0x{:x}",
              packet.len(), declared);
        &packet[..declared]
    };

    let control = parse_control(packet, data_packet_size)?;
    trace!("parsed control sequences: {:?}", control);

    // The even lines run up to the odd lines, and the odd lines run up to
    // the control sequences.
    let [even, odd] = control.rle_offsets;
    let (start_0, start_1) = (usize::from(even), usize::from(odd));
    if start_0 < HEADER_LEN || start_0 >= start_1 || start_1 > data_packet_size {
        return Err(Error::InvalidRleOffsets {
            even,
            odd,
            end: data_packet_size,
        });
    }
    let halves = [&packet[start_0..start_1], &packet[start_1..data_packet_size]];
    Ok((control, halves))
}

/// Map each raw 2-bit code to its pixel.  Raw values count down from local
/// color 3, so we subtract them from 3 to get the same results as everybody
/// else.
fn color_table<const N: usize, F>(pixel: F) -> [[u8; N]; 4]
where
    F: Fn(usize) -> [u8; N],
{
    [pixel(3), pixel(2), pixel(1), pixel(0)]
}

fn size_of(control: &Control) -> Size {
    Size {
        w: cast::usize(control.coordinates.width()),
        h: cast::usize(control.coordinates.height()),
    }
}

/// Decode a reassembled subtitle packet using the 16-color `palette` from
/// the `*.idx` file.  Times are relative to the subtitle's own time stamp,
/// and the origin is relative to the `*.idx` origin.
pub fn decode_subtitle(
    packet: &[u8],
    palette: &Palette,
    config: &DecoderConfig,
) -> Result<DecodedSubtitle> {
    let (control, halves) = parse_packet(packet, config)?;
    let colors = color_table(|local| {
        let rgb = palette[usize::from(control.palette[local])];
        [rgb[0], rgb[1], rgb[2], control.alpha[local]]
    });
    let size = size_of(&control);
    let pixels = decompress(size, halves, &colors);
    let coords = &control.coordinates;
    Ok(DecodedSubtitle {
        begin: control.begin,
        end: control.end,
        force: control.force,
        origin: (i32::from(coords.left()), i32::from(coords.top())),
        extent: (u32::from(coords.width()), u32::from(coords.height())),
        pixels,
    })
}

/// Decode a subtitle packet without a palette, returning its control data
/// and one byte per pixel holding the local color (0 to 3).
pub fn decode_indexed(packet: &[u8], config: &DecoderConfig) -> Result<(Control, Vec<u8>)> {
    let (control, halves) = parse_packet(packet, config)?;
    // `local` is at most 3.
    let colors = color_table(|local| [local as u8]);
    let indices = decompress(size_of(&control), halves, &colors);
    Ok((control, indices))
}

#[cfg(test)]
use crate::test_util::{display_commands, subtitle_packet};
#[cfg(test)]
use image::Rgb;

#[cfg(test)]
fn test_palette() -> Palette {
    let mut palette = [Rgb([0, 0, 0]); 16];
    palette[1] = Rgb([0xff, 0xff, 0xff]);
    palette[2] = Rgb([0x80, 0x80, 0x80]);
    palette[3] = Rgb([0xc0, 0xc0, 0xc0]);
    palette
}

#[test]
fn decode_two_pixel_subtitle() {
    let _ = env_logger::try_init();
    // Local color 1 is raw code value 2: a run of 2 is (2 << 2) | 2.
    let even = [0xa0];
    let commands = display_commands((0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len());
    let packet = subtitle_packet(&even, &[], &[(0, commands), (150, vec![0x02])]);

    let sub = decode_subtitle(&packet, &test_palette(), &DecoderConfig::default()).unwrap();
    assert_eq!(sub.begin(), 0.0);
    assert_eq!(sub.end(), Some(1.5));
    assert!(!sub.force());
    assert_eq!(sub.origin(), (0, 0));
    assert_eq!(sub.extent(), (2, 1));
    assert_eq!(sub.pixels(), &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

    let image = sub.to_image();
    assert_eq!(image.dimensions(), (2, 1));
    assert_eq!(image.get_pixel(1, 0), &Rgba([0xff, 0xff, 0xff, 0xff]));

    let (control, indices) = decode_indexed(&packet, &DecoderConfig::default()).unwrap();
    assert_eq!(control.palette, [0, 1, 2, 3]);
    assert_eq!(indices, vec![1, 1]);
}

#[test]
fn decode_interlaced_subtitle() {
    // 2x2 at (10, 20): row 0 is local colors [3, 0], row 1 is [2, 2].
    let even = [0x47];
    let odd = [0x91];
    let commands = display_commands((10, 11, 20, 21), [0, 1, 2, 3], [0, 0xf, 0x8, 0xf], even.len());
    let packet = subtitle_packet(&even, &odd, &[(0, commands)]);

    let sub = decode_subtitle(&packet, &test_palette(), &DecoderConfig::default()).unwrap();
    assert_eq!(sub.origin(), (10, 20));
    assert_eq!(sub.extent(), (2, 2));
    assert_eq!(sub.end(), None);
    assert_eq!(sub.pixels(), &[
        0xc0, 0xc0, 0xc0, 0xff, 0x00, 0x00, 0x00, 0x00,
        0x80, 0x80, 0x80, 0x88, 0x80, 0x80, 0x80, 0x88,
    ][..]);
}

#[test]
fn decode_is_repeatable() {
    let even = [0xa0];
    let commands = display_commands((0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len());
    let packet = subtitle_packet(&even, &[], &[(0, commands)]);
    let config = DecoderConfig::default();
    let first = decode_subtitle(&packet, &test_palette(), &config).unwrap();
    let second = decode_subtitle(&packet, &test_palette(), &config).unwrap();
    assert_eq!(first.pixels(), second.pixels());
}

#[test]
fn bad_rle_offsets_are_rejected() {
    let even = [0xa0];
    let mut commands = display_commands((0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len());
    // Point the odd lines past the control sequences.
    let last = commands.len() - 1;
    commands[last] = 0x40;
    let packet = subtitle_packet(&even, &[], &[(0, commands)]);
    let result = decode_subtitle(&packet, &test_palette(), &DecoderConfig::default());
    assert!(matches!(result, Err(Error::InvalidRleOffsets { .. })));
}

#[test]
fn declared_size_is_checked() {
    let even = [0xa0];
    let commands = display_commands((0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len());
    let mut packet = subtitle_packet(&even, &[], &[(0, commands)]);
    let declared = packet.len() as u16 + 1;
    packet[0..2].copy_from_slice(&declared.to_be_bytes());

    let result = decode_subtitle(&packet, &test_palette(), &DecoderConfig::default());
    assert!(matches!(result, Err(Error::SizeMismatch { .. })));

    let lenient = DecoderConfig::new().with_check_subtitle_size(false);
    assert!(decode_subtitle(&packet, &test_palette(), &lenient).is_ok());

    // Extra trailing bytes are trimmed.
    let mut padded = subtitle_packet(&even, &[], &[(0, display_commands(
        (0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len()))]);
    padded.extend_from_slice(&[0xff, 0xff]);
    assert!(decode_subtitle(&padded, &test_palette(), &DecoderConfig::default()).is_ok());
}

#[test]
fn short_packets_are_truncated() {
    let result = decode_subtitle(&[0x00], &test_palette(), &DecoderConfig::default());
    assert!(matches!(result, Err(Error::TruncatedStream { .. })));
}
