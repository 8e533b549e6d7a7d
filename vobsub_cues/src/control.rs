//! # Subtitle control sequences.
//!
//! Each subtitle packet ends with a chain of control sequences.  Every
//! sequence has a date (in 1/100ths of a second), the offset of the next
//! sequence, and a list of one-byte commands terminated by `0xff`.  The last
//! sequence points at itself.
//!
//! For background, see [this documentation on the DVD subtitle format][subs].
//!
//! [subs]: http://sam.zoy.org/writings/dvd/subtitles/

use nom::bits::bits;
use nom::combinator::map;
use nom::number::complete::be_u16;
use nom::sequence::pair;
use nom::IResult;

use crate::errors::{Error, Result};
use crate::util::{bit_field, BitInput, ByteCursor};

/// Parse four 4-bit values.
fn nibbles(input: BitInput) -> IResult<BitInput, [u8; 4]> {
    let (input, a) = bit_field(input, 4)?;
    let (input, b) = bit_field(input, 4)?;
    let (input, c) = bit_field(input, 4)?;
    let (input, d) = bit_field(input, 4)?;
    Ok((input, [a, b, c, d]))
}

/// Parse four 4-bit palette or alpha entries.
fn palette_entries(input: &[u8]) -> IResult<&[u8], [u8; 4]> {
    bits(nibbles)(input)
}

#[test]
fn parse_palette_entries() {
    assert_eq!(palette_entries(&[0x03, 0x10][..]),
               Ok((&[][..], [0x00, 0x03, 0x01, 0x00])));
}

/// Location at which to display the subtitle, with the right and bottom
/// edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinates {
    x1: u16,
    x2: u16,
    y1: u16,
    y2: u16,
}

impl Coordinates {
    /// The leftmost edge of the subtitle.
    pub fn left(&self) -> u16 {
        self.x1
    }

    /// The top edge of the subtitle.
    pub fn top(&self) -> u16 {
        self.y1
    }

    /// The width of the subtitle.
    pub fn width(&self) -> u16 {
        self.x2 + 1 - self.x1
    }

    /// The height of the subtitle.
    pub fn height(&self) -> u16 {
        self.y2 + 1 - self.y1
    }
}

/// Parse four 12-bit coordinate values, in the order `x1, x2, y1, y2`.
fn coordinate_bits(input: BitInput) -> IResult<BitInput, Coordinates> {
    let (input, x1) = bit_field(input, 12)?;
    let (input, x2) = bit_field(input, 12)?;
    let (input, y1) = bit_field(input, 12)?;
    let (input, y2) = bit_field(input, 12)?;
    Ok((input, Coordinates { x1, x2, y1, y2 }))
}

fn coordinates(input: &[u8]) -> IResult<&[u8], Coordinates> {
    bits(coordinate_bits)(input)
}

#[test]
fn parse_coordinates() {
    let input = &[0x29, 0xb4, 0xe6, 0x3c, 0x54, 0x00][..];
    let expected = Coordinates { x1: 0x29b, x2: 0x4e6, y1: 0x3c5, y2: 0x400 };
    assert_eq!(coordinates(input), Ok((&[][..], expected)));
    assert_eq!(expected.width(), 0x4e6 - 0x29b + 1);
    assert!(coordinates(&input[..5]).is_err());
}

/// Parse a pair of 16-bit RLE offsets.
fn rle_offsets(input: &[u8]) -> IResult<&[u8], [u16; 2]> {
    map(pair(be_u16, be_u16), |(even, odd)| [even, odd])(input)
}

/// Individual commands which may appear in a control sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ControlCommand {
    /// Should this subtitle be displayed even if subtitles are turned off?
    Force,
    /// Start displaying the subtitle at this sequence's date.
    StartDate,
    /// Stop displaying the subtitle at this sequence's date.
    StopDate,
    /// Map each of the 4 colors in this subtitle to the 16-color palette.
    Palette([u8; 4]),
    /// 4 bits of alpha for each of the 4 colors.
    Alpha([u8; 4]),
    /// Coordinates at which to display the subtitle.
    Coordinates(Coordinates),
    /// Offsets of the first even and odd scan lines.  The image stores
    /// alternating scan lines separately.
    RleOffsets([u16; 2]),
}

/// Read one command, or `None` at the `0xff` which ends a sequence.
fn control_command(cursor: &mut ByteCursor) -> Result<Option<ControlCommand>> {
    let offset = cursor.position();
    let opcode = cursor.read("control command")?;
    let command = match opcode {
        0x00 => ControlCommand::Force,
        0x01 => ControlCommand::StartDate,
        0x02 => ControlCommand::StopDate,
        0x03 => ControlCommand::Palette(cursor.parse("palette command", palette_entries)?),
        0x04 => ControlCommand::Alpha(cursor.parse("alpha command", palette_entries)?),
        0x05 => ControlCommand::Coordinates(cursor.parse("coordinates command", coordinates)?),
        0x06 => ControlCommand::RleOffsets(cursor.parse("RLE offsets command", rle_offsets)?),
        0xff => return Ok(None),
        opcode => return Err(Error::UnknownOpcode { opcode, offset }),
    };
    Ok(Some(command))
}

/// Everything the control sequences told us about a subtitle.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// When to start showing the subtitle, in seconds after its time stamp.
    pub begin: f64,
    /// When to stop showing the subtitle, if known.
    pub end: Option<f64>,
    /// Should the subtitle be shown even when subtitles are off?
    pub force: bool,
    /// Entries in the 16-color palette for local colors 0 to 3.
    pub palette: [u8; 4],
    /// 8-bit alpha for local colors 0 to 3.
    pub alpha: [u8; 4],
    /// Where to draw the subtitle.
    pub coordinates: Coordinates,
    /// Offsets of the even and odd scan lines within the packet.
    pub rle_offsets: [u16; 2],
}

/// Values collected while walking the control sequences.
#[derive(Debug, Default)]
struct ControlState {
    begin: Option<f64>,
    end: Option<f64>,
    force: bool,
    palette: Option<[u8; 4]>,
    alpha: Option<[u8; 4]>,
    coordinates: Option<Coordinates>,
    rle_offsets: Option<[u16; 2]>,
}

impl ControlState {
    fn apply(&mut self, command: ControlCommand, seconds: f64) -> Result<()> {
        match command {
            ControlCommand::Force => self.force = true,
            ControlCommand::StartDate => {
                self.begin = self.begin.or(Some(seconds));
            }
            ControlCommand::StopDate => {
                self.end = self.end.or(Some(seconds));
            }
            ControlCommand::Palette(p) => self.palette = Some(p),
            ControlCommand::Alpha(a) => {
                // Expand 4-bit alpha to 8 bits.
                self.alpha = Some(a.map(|n| n << 4 | n));
            }
            ControlCommand::Coordinates(c) => {
                if c.x2 < c.x1 || c.y2 < c.y1 {
                    return Err(Error::InvalidCoordinates {
                        x1: c.x1,
                        x2: c.x2,
                        y1: c.y1,
                        y2: c.y2,
                    });
                }
                self.coordinates = Some(c);
            }
            ControlCommand::RleOffsets(r) => self.rle_offsets = Some(r),
        }
        Ok(())
    }

    fn finish(self) -> Result<Control> {
        let missing = |missing| Error::IncompleteControlState { missing };
        Ok(Control {
            begin: self.begin.unwrap_or_else(|| {
                debug!("no start date for subtitle, using 0");
                0.0
            }),
            end: self.end,
            force: self.force,
            palette: self.palette.ok_or_else(|| missing("palette"))?,
            alpha: self.alpha.ok_or_else(|| missing("alpha"))?,
            coordinates: self.coordinates.ok_or_else(|| missing("coordinates"))?,
            rle_offsets: self.rle_offsets.ok_or_else(|| missing("RLE offsets"))?,
        })
    }
}

/// Walk the chain of control sequences in `packet`, starting at `offset`.
/// Offsets are relative to the start of the packet.
pub fn parse_control(packet: &[u8], mut offset: usize) -> Result<Control> {
    let mut state = ControlState::default();
    loop {
        let mut cursor = ByteCursor::new(packet);
        cursor.seek(offset, "control sequence")?;
        let date = cursor.read_be_u16("control sequence date")?;
        let next = usize::from(cursor.read_be_u16("next control sequence offset")?);
        let seconds = f64::from(date) / 100.0;
        trace!("control sequence at 0x{:x}: date {}, next 0x{:x}", offset, date, next);

        while let Some(command) = control_command(&mut cursor)? {
            trace!("control command: {:?}", command);
            state.apply(command, seconds)?;
        }

        if next == offset {
            // This points back at us, so we're the last sequence.
            break;
        } else if next < offset {
            return Err(Error::InvalidControlOffset { offset, next });
        }
        offset = next;
    }
    state.finish()
}

#[test]
fn parse_control_sequences() {
    let packet = &[
        // Padding standing in for the header and image.
        0x00, 0x00, 0x00, 0x00,
        // 0x04: first sequence.
        0x00, 0x00, 0x00, 0x1c,
        0x01,
        0x03, 0x03, 0x10,
        0x04, 0xff, 0xf0,
        0x05, 0x29, 0xb4, 0xe6, 0x3c, 0x54, 0x00,
        0x06, 0x00, 0x04, 0x07, 0x7b,
        0xff,
        // 0x1c: last sequence.
        0x00, 0x77, 0x00, 0x1c,
        0x02,
        0xff,
    ][..];
    let control = parse_control(packet, 4).unwrap();
    assert_eq!(control, Control {
        begin: 0.0,
        end: Some(1.19),
        force: false,
        palette: [0x0, 0x3, 0x1, 0x0],
        alpha: [0xff, 0xff, 0xff, 0x00],
        coordinates: Coordinates { x1: 0x29b, x2: 0x4e6, y1: 0x3c5, y2: 0x400 },
        rle_offsets: [0x0004, 0x077b],
    });
}

#[test]
fn force_and_out_of_order_commands() {
    let packet = &[
        0x00, 0x32, 0x00, 0x00,
        0x00,
        0x06, 0x00, 0x04, 0x00, 0x05,
        0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x04, 0xf0, 0x00,
        0x03, 0x01, 0x23,
        0x01,
        0xff,
    ][..];
    let control = parse_control(packet, 0).unwrap();
    assert!(control.force);
    assert_eq!(control.begin, 0.5);
    assert_eq!(control.end, None);
    assert_eq!(control.coordinates.width(), 1);
    assert_eq!(control.coordinates.height(), 1);
}

#[test]
fn unknown_opcode_is_an_error() {
    let packet = &[0x00, 0x00, 0x00, 0x00, 0x01, 0x07, 0xff][..];
    match parse_control(packet, 0) {
        Err(Error::UnknownOpcode { opcode, offset }) => {
            assert_eq!(opcode, 0x07);
            assert_eq!(offset, 5);
        }
        other => panic!("expected unknown opcode, got {:?}", other),
    }
}

#[test]
fn missing_values_are_errors() {
    // Start date only.
    let packet = &[0x00, 0x00, 0x00, 0x00, 0x01, 0xff][..];
    assert!(matches!(parse_control(packet, 0),
                     Err(Error::IncompleteControlState { missing: "palette" })));
}

#[test]
fn malformed_chains_are_errors() {
    // Truncated in the middle of a coordinates command.
    let packet = &[0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00][..];
    assert!(matches!(parse_control(packet, 0), Err(Error::TruncatedStream { .. })));

    // Next sequence points backwards.
    let packet = &[0x00, 0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff][..];
    assert!(matches!(parse_control(packet, 5),
                     Err(Error::InvalidControlOffset { offset: 5, next: 0 })));

    // Reversed bounding box.
    let packet = &[0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x20, 0x01, 0x00, 0x00, 0x00, 0xff][..];
    assert!(matches!(parse_control(packet, 0), Err(Error::InvalidCoordinates { .. })));
}
