//! # MPEG-2 Packetized Elementary Streams (PES)
//!
//! These packets are nested inside the MPEG-2 Program Stream packs found in
//! a `*.sub` file.  A single subtitle may be split across several PES
//! packets; the first one carries a Presentation Time Stamp, and the rest
//! are continuations.
//!
//! See the [PES header documentation][PES] for details.
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

use nom::bits::bits;
use nom::IResult;

use super::clock::Clock;
use super::ps::Pack;
use crate::config::DecoderConfig;
use crate::errors::{Error, Result};
use crate::util::{ByteCursor, HexPreview};

/// The stream id used for DVD subtitles ("private stream 1").
pub const PRIVATE_STREAM_1: u8 = 0xbd;

/// Length of the fixed MPEG-2 pack header, including the start code.
const PACK_HEADER_LEN: usize = 14;

/// The prefix shared by all PES start codes.
const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Set in the second PES header flag byte when a PTS is present.
const PTS_FLAG: u8 = 0x80;

/// The reassembled bytes of one subtitle, tagged with the offset of the
/// pack that started it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSubtitleUnit {
    /// Offset of the pack containing the first fragment.  This is the key
    /// used by `filepos` entries in the `*.idx` file.
    pub offset: u64,
    /// The Presentation Time Stamp of the first fragment, in seconds.
    pub pts: Option<f64>,
    /// All fragments, concatenated in the order they appeared.
    pub payload: Vec<u8>,
}

/// The parts of a private stream 1 packet we care about.
#[derive(Debug, PartialEq, Eq)]
struct PrivatePacket<'a> {
    pts: Option<Clock>,
    substream_id: u8,
    data: &'a [u8],
}

/// Parse a 5-byte PTS field.
fn pts(input: &[u8]) -> IResult<&[u8], Clock> {
    bits(Clock::parse_bits)(input)
}

/// Parse the body of a private stream 1 packet, starting just after the
/// packet length.
fn private_packet(body: &[u8]) -> Result<PrivatePacket> {
    let mut cursor = ByteCursor::new(body);
    cursor.skip(1, "PES header flags")?;
    let flags = cursor.read("PES header flags")?;
    let header_len = cursor.read("PES header length")?;
    let mut header = ByteCursor::new(cursor.take(usize::from(header_len), "PES header data")?);
    let pts = if flags & PTS_FLAG != 0 {
        Some(header.parse("presentation time stamp", pts)?)
    } else {
        None
    };
    let substream_id = cursor.read("subtitle stream id")?;
    Ok(PrivatePacket {
        pts,
        substream_id,
        data: cursor.rest(),
    })
}

#[test]
fn parse_private_packet() {
    let body = &[
        0x81,
        0x80, 0x05, 0x21, 0x00, 0xab, 0xe9, 0xc1,
        0x20,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ][..];
    let packet = private_packet(body).unwrap();
    assert_eq!(packet, PrivatePacket {
        pts: Some(Clock::base(2815200)),
        substream_id: 0x20,
        data: &[0x00; 7],
    });

    // Without a PTS, the stuffing bytes are skipped anyway.
    let body = &[0x81, 0x00, 0x02, 0xff, 0xff, 0x21, 0xaa][..];
    let packet = private_packet(body).unwrap();
    assert_eq!(packet.pts, None);
    assert_eq!(packet.substream_id, 0x21);
    assert_eq!(packet.data, &[0xaa]);

    assert!(private_packet(&[0x81, 0x80, 0x05, 0x21]).is_err());
}

/// The subtitle currently being collected.
#[derive(Debug)]
struct OpenUnit {
    unit: RawSubtitleUnit,
    /// Set if one of our fragments was cut short, in which case the whole
    /// unit is unusable.
    truncated: bool,
}

/// Accumulates fragments into `RawSubtitleUnit`s during a single pass over
/// the packs.
#[derive(Debug, Default)]
struct Reassembler {
    open: Option<OpenUnit>,
    units: Vec<RawSubtitleUnit>,
    /// The pack offset of the last subtitle we started.  Offsets are the
    /// keys used by the `*.idx` file, so each may begin only one subtitle.
    last_start: Option<u64>,
}

impl Reassembler {
    /// Begin a new subtitle, finishing any that was already open.
    fn start(&mut self, offset: u64, pts: Option<f64>, data: &[u8]) {
        self.flush();
        if self.last_start == Some(offset) {
            warn!("second subtitle in pack at 0x{:x}, skipping it", offset);
            return;
        }
        self.last_start = Some(offset);
        self.open = Some(OpenUnit {
            unit: RawSubtitleUnit {
                offset,
                pts,
                payload: data.to_owned(),
            },
            truncated: false,
        });
    }

    /// Add a continuation fragment to the open subtitle.
    fn append(&mut self, offset: u64, data: &[u8]) {
        match self.open {
            Some(ref mut open) => open.unit.payload.extend_from_slice(data),
            None => debug!("dropping continuation at 0x{:x} with no subtitle open", offset),
        }
    }

    /// A damaged packet would have started a new subtitle, so the open one
    /// is complete.  Keep it, and drop the damaged one.
    fn discard(&mut self, offset: u64, err: &Error) {
        warn!("dropping damaged subtitle in pack at 0x{:x}: {}", offset, err);
        self.flush();
    }

    /// Mark the open subtitle as damaged.
    fn truncate(&mut self, offset: u64, err: &Error) {
        warn!("damaged PES packet in pack at 0x{:x}: {}", offset, err);
        if let Some(ref mut open) = self.open {
            open.truncated = true;
        }
    }

    /// Move the open subtitle, if any, to our output.
    fn flush(&mut self) {
        if let Some(open) = self.open.take() {
            if open.truncated {
                warn!("dropping truncated subtitle at 0x{:x}", open.unit.offset);
            } else {
                trace!("reassembled subtitle at 0x{:x}: {:?}",
                       open.unit.offset, HexPreview(&open.unit.payload));
                self.units.push(open.unit);
            }
        }
    }

    fn finish(mut self) -> Vec<RawSubtitleUnit> {
        self.flush();
        self.units
    }
}

/// Read the stream id and packet length following a PES start code.
fn pes_header(cursor: &mut ByteCursor) -> Result<(u8, u16)> {
    let stream_id = cursor.read("PES stream id")?;
    let length = cursor.read_be_u16("PES packet length")?;
    Ok((stream_id, length))
}

/// Handle a private stream 1 packet we couldn't read in full.  `partial`
/// is whatever we managed to parse from `body`.
fn damaged_packet(
    offset: u64,
    body: &[u8],
    partial: Option<&PrivatePacket>,
    err: &Error,
    config: &DecoderConfig,
    reassembler: &mut Reassembler,
) {
    let starts_subtitle = match partial {
        Some(partial) if partial.substream_id & 0x1f != config.subtitle_stream() => {
            debug!("damaged packet for stream 0x{:02x} in pack at 0x{:x}",
                   partial.substream_id, offset);
            return;
        }
        Some(partial) => partial.pts.is_some(),
        // The PTS flag is in the second byte, ahead of anything that can be
        // cut short.
        None => body.get(1).map_or(false, |flags| flags & PTS_FLAG != 0),
    };
    if starts_subtitle {
        reassembler.discard(offset, err);
    } else {
        reassembler.truncate(offset, err);
    }
}

/// Walk the PES packets in one pack, feeding subtitle fragments to
/// `reassembler`.
fn scan_pack(pack: &Pack, config: &DecoderConfig, reassembler: &mut Reassembler) -> Result<()> {
    if pack.payload.len() < PACK_HEADER_LEN {
        return Err(Error::truncated("pack header"));
    }
    let mut cursor = ByteCursor::new(pack.payload);
    cursor.seek(PACK_HEADER_LEN, "pack header")?;

    loop {
        let found = cursor.rest()
            .windows(PES_START_CODE.len())
            .position(|window| window == PES_START_CODE);
        let start = match found {
            Some(start) => start,
            None => return Ok(()),
        };
        cursor.skip(start + PES_START_CODE.len(), "PES start code")?;

        let (stream_id, length) = match pes_header(&mut cursor) {
            Ok(header) => header,
            Err(err) => {
                reassembler.truncate(pack.offset, &err);
                return Ok(());
            }
        };

        if stream_id != PRIVATE_STREAM_1 {
            trace!("skipping stream 0x{:02x} ({} bytes)", stream_id, length);
            if cursor.skip(usize::from(length), "PES packet").is_err() {
                debug!("stream 0x{:02x} runs past end of pack at 0x{:x}", stream_id, pack.offset);
                return Ok(());
            }
            continue;
        }

        let (body, complete) = match cursor.take(usize::from(length), "PES packet") {
            Ok(body) => (body, true),
            Err(_) => (cursor.rest(), false),
        };
        let packet = match (private_packet(body), complete) {
            (Ok(packet), true) => packet,
            (Ok(partial), false) => {
                let err = Error::truncated("PES packet");
                damaged_packet(pack.offset, body, Some(&partial), &err, config, reassembler);
                return Ok(());
            }
            (Err(err), complete) => {
                damaged_packet(pack.offset, body, None, &err, config, reassembler);
                if complete {
                    continue;
                }
                return Ok(());
            }
        };

        if packet.substream_id & 0x1f != config.subtitle_stream() {
            trace!("skipping subtitle stream 0x{:02x}", packet.substream_id);
            continue;
        }

        match packet.pts {
            Some(pts) => reassembler.start(pack.offset, Some(pts.to_seconds()), packet.data),
            None => reassembler.append(pack.offset, packet.data),
        }
    }
}

/// Collect the subtitles in a sequence of packs.  Each subtitle begins with
/// a PES packet carrying a PTS, and continues through any following packets
/// without one.
///
/// A pack too short to hold its own header is a structural error.  A
/// damaged PES packet only causes the subtitle it belongs to to be dropped.
pub fn reassemble<'a, I>(packs: I, config: &DecoderConfig) -> Result<Vec<RawSubtitleUnit>>
where
    I: IntoIterator<Item = Pack<'a>>,
{
    let mut reassembler = Reassembler::default();
    for pack in packs {
        scan_pack(&pack, config, &mut reassembler)?;
    }
    Ok(reassembler.finish())
}

#[cfg(test)]
use crate::test_util::{pack, padding_pes, private_pes};

#[cfg(test)]
fn units_for(input: &[u8]) -> Vec<RawSubtitleUnit> {
    let _ = env_logger::try_init();
    reassemble(super::ps::packs(input), &DecoderConfig::default()).unwrap()
}

#[test]
fn empty_input_has_no_units() {
    assert!(units_for(&[]).is_empty());
}

#[test]
fn reassemble_split_subtitle() {
    let mut input = pack(&[private_pes(Some(9000), 0x20, &[1, 2, 3])]);
    input.extend(pack(&[private_pes(None, 0x20, &[4, 5]), padding_pes(6)]));
    let third = input.len() as u64;
    input.extend(pack(&[private_pes(Some(18000), 0x20, &[6])]));

    let units = units_for(&input);
    assert_eq!(units, vec![
        RawSubtitleUnit { offset: 0, pts: Some(0.1), payload: vec![1, 2, 3, 4, 5] },
        RawSubtitleUnit { offset: third, pts: Some(0.2), payload: vec![6] },
    ]);
}

#[test]
fn other_streams_are_ignored() {
    let input = pack(&[
        padding_pes(4),
        private_pes(Some(0), 0x21, &[9, 9]),
        private_pes(Some(0), 0x20, &[1]),
        private_pes(None, 0x21, &[9]),
        private_pes(None, 0x20, &[2]),
    ]);
    let units = units_for(&input);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].payload, vec![1, 2]);

    let config = DecoderConfig::new().with_subtitle_stream(1);
    let units = reassemble(super::ps::packs(&input), &config).unwrap();
    assert_eq!(units[0].payload, vec![9, 9, 9]);
}

#[test]
fn truncated_packet_drops_only_its_subtitle() {
    let mut input = pack(&[private_pes(Some(0), 0x20, &[1, 2, 3])]);
    // Cut the first subtitle's packet short.
    input.truncate(input.len() - 1);
    let second = input.len() as u64;
    input.extend(pack(&[private_pes(Some(90000), 0x20, &[7])]));

    let units = units_for(&input);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].offset, second);
    assert_eq!(units[0].payload, vec![7]);
}

#[test]
fn short_pack_is_a_structural_error() {
    let input = [0x00, 0x00, 0x01, 0xba, 0x44];
    let result = reassemble(super::ps::packs(&input), &DecoderConfig::default());
    assert!(matches!(result, Err(Error::TruncatedStream { .. })));
}

#[test]
fn damaged_packet_with_pts_keeps_previous_subtitle() {
    let mut input = pack(&[private_pes(Some(0), 0x20, &[1, 2, 3])]);
    // A new subtitle whose header is too short to read.
    input.extend(pack(&[vec![0x00, 0x00, 0x01, 0xbd, 0x00, 0x02, 0x81, 0x80]]));
    // A continuation of the damaged subtitle, which must not be appended
    // to the first one.
    input.extend(pack(&[private_pes(None, 0x20, &[4])]));
    let units = units_for(&input);
    assert_eq!(units, vec![
        RawSubtitleUnit { offset: 0, pts: Some(0.0), payload: vec![1, 2, 3] },
    ]);

    // The same, with the packet cut short by the end of the pack.
    let mut input = pack(&[private_pes(Some(0), 0x20, &[1, 2, 3])]);
    input.extend(pack(&[vec![0x00, 0x00, 0x01, 0xbd, 0x00, 0x20, 0x81, 0x80]]));
    let units = units_for(&input);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].payload, vec![1, 2, 3]);
}

#[test]
fn damaged_continuation_drops_its_subtitle() {
    let mut input = pack(&[private_pes(Some(0), 0x20, &[1, 2, 3])]);
    input.extend(pack(&[vec![0x00, 0x00, 0x01, 0xbd, 0x00, 0x02, 0x81, 0x00]]));
    assert!(units_for(&input).is_empty());
}

#[test]
fn one_subtitle_per_pack_offset() {
    let mut input = pack(&[
        private_pes(Some(0), 0x20, &[1]),
        private_pes(Some(9000), 0x20, &[2]),
        private_pes(None, 0x20, &[3]),
    ]);
    let second = input.len() as u64;
    input.extend(pack(&[private_pes(Some(18000), 0x20, &[4])]));

    let units = units_for(&input);
    let offsets = units.iter().map(|u| u.offset).collect::<Vec<_>>();
    assert_eq!(offsets, vec![0, second]);
    assert_eq!(units[0].payload, vec![1]);
    assert_eq!(units[1].payload, vec![4]);
}
