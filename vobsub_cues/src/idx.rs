//! Parse a file in `*.idx` format.
//!
//! These are line-oriented text files made up of `key: value` directives.
//! We need `size`, `org`, and `palette`, and we collect every `timestamp`
//! line as a cue.  Everything else is ignored.

use image::Rgb;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_till, take_while_m_n};
use nom::character::complete::{char, hex_digit1, i32 as dec_i32, space0, u32 as dec_u32};
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{preceded, separated_pair, tuple};
use nom::IResult;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// The 16-color palette used by the subtitles.
pub type Palette = [Rgb<u8>; 16];

/// A comma, optionally followed by spaces.
fn comma(input: &str) -> IResult<&str, ()> {
    map(tuple((char(','), space0)), |_| ())(input)
}

/// Parse a 6-digit hexadecimal RGB color.
fn rgb(input: &str) -> IResult<&str, Rgb<u8>> {
    map_res(
        take_while_m_n(6, 6, |c: char| c.is_ascii_hexdigit()),
        |hex: &str| -> std::result::Result<Rgb<u8>, std::num::ParseIntError> {
            let value = u32::from_str_radix(hex, 16)?;
            Ok(Rgb([(value >> 16) as u8, (value >> 8) as u8, value as u8]))
        },
    )(input)
}

#[test]
fn parse_rgb() {
    assert_eq!(rgb("1234ab"), Ok(("", Rgb([0x12, 0x34, 0xab]))));
    assert!(rgb("1234a").is_err());
}

/// Parse between 1 and 16 colors.  Any colors not listed are black.
fn palette(input: &str) -> IResult<&str, Palette> {
    map_res(separated_list1(comma, rgb), |colors: Vec<Rgb<u8>>| {
        if colors.len() > 16 {
            return Err("palettes have at most 16 entries");
        }
        let mut result = [Rgb([0, 0, 0]); 16];
        result[..colors.len()].copy_from_slice(&colors);
        Ok(result)
    })(input)
}

#[test]
fn parse_palette() {
    let input = "\
000000, f0f0f0, cccccc, 999999, 3333fa, 1111bb, fa3333, bb1111, \
33fa33, 11bb11, fafa33, bbbb11, fa33fa, bb11bb, 33fafa, 11bbbb";
    let (rest, parsed) = palette(input).unwrap();
    assert_eq!(rest, "");
    assert_eq!(parsed[0], Rgb([0x00, 0x00, 0x00]));
    assert_eq!(parsed[1], Rgb([0xf0, 0xf0, 0xf0]));
    assert_eq!(parsed[4], Rgb([0x33, 0x33, 0xfa]));
    assert_eq!(parsed[15], Rgb([0x11, 0xbb, 0xbb]));

    // Short palettes are padded with black.
    let (_, short) = palette("000000,FFFFFF,808080,C0C0C0").unwrap();
    assert_eq!(short[1], Rgb([0xff, 0xff, 0xff]));
    assert_eq!(short[3], Rgb([0xc0, 0xc0, 0xc0]));
    assert_eq!(short[4], Rgb([0x00, 0x00, 0x00]));

    let too_long = vec!["000000"; 17].join(", ");
    assert!(palette(&too_long).is_err());
}

/// Parse a frame size like `720x480`.
fn size(input: &str) -> IResult<&str, (u32, u32)> {
    separated_pair(dec_u32, char('x'), dec_u32)(input)
}

/// Parse an origin like `0, 0`.
fn origin(input: &str) -> IResult<&str, (i32, i32)> {
    separated_pair(dec_i32, comma, dec_i32)(input)
}

/// Parse a time like `00:01:02:345` into seconds.  Some tools write
/// negative times when a delay has been applied.
fn time(input: &str) -> IResult<&str, f64> {
    map(
        tuple((
            opt(char('-')),
            dec_u32,
            preceded(char(':'), dec_u32),
            preceded(char(':'), dec_u32),
            preceded(char(':'), dec_u32),
        )),
        |(sign, h, m, s, ms)| {
            let millis = u64::from(h) * 3_600_000 + u64::from(m) * 60_000
                + u64::from(s) * 1000 + u64::from(ms);
            let seconds = millis as f64 / 1000.0;
            if sign.is_some() {
                -seconds
            } else {
                seconds
            }
        },
    )(input)
}

/// Parse a hexadecimal file position, with or without a `0x` prefix.
fn file_position(input: &str) -> IResult<&str, u64> {
    map_res(
        preceded(opt(alt((tag("0x"), tag("0X")))), hex_digit1),
        |hex: &str| u64::from_str_radix(hex, 16),
    )(input)
}

/// A single `timestamp` entry from an `*.idx` file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdxCue {
    /// When this subtitle should be shown, in seconds.
    pub seconds: f64,
    /// Offset of the pack containing this subtitle in the `*.sub` file.
    pub file_offset: u64,
}

/// Parse the value of a `timestamp` line.
fn cue(input: &str) -> IResult<&str, IdxCue> {
    map(
        separated_pair(
            time,
            comma,
            preceded(tuple((tag_no_case("filepos:"), space0)), file_position),
        ),
        |(seconds, file_offset)| IdxCue {
            seconds,
            file_offset,
        },
    )(input)
}

#[test]
fn parse_cue() {
    assert_eq!(cue("00:00:49:400, filepos: 000000000"),
               Ok(("", IdxCue { seconds: 49.4, file_offset: 0 })));
    assert_eq!(cue("01:02:03:004, filepos: 0x10"),
               Ok(("", IdxCue { seconds: 3723.004, file_offset: 0x10 })));
    assert_eq!(cue("-00:00:01:500, filepos: 000001800"),
               Ok(("", IdxCue { seconds: -1.5, file_offset: 0x1800 })));
    assert!(cue("00:00:49, filepos: 000000000").is_err());
    assert!(cue("00:00:49:400, filepos: xyz").is_err());
}

/// Parse the value of an `id` line, like `en, index: 0`.
fn track_id(input: &str) -> IResult<&str, (&str, Option<u32>)> {
    tuple((
        take_till(|c: char| c == ','),
        opt(preceded(tuple((comma, tag("index:"), space0)), dec_u32)),
    ))(input)
}

/// Run `parser` over an entire directive value.
fn parse_value<'a, O, F>(line: usize, key: &str, value: &'a str, parser: F) -> Result<O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    all_consuming(parser)(value)
        .map(|(_, parsed)| parsed)
        .map_err(|_| {
            Error::malformed_index(line, format!("could not parse {} value {:?}", key, value))
        })
}

/// The contents of an `*.idx` file describing the subtitles in a `*.sub`
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    frame_size: (u32, u32),
    origin: (i32, i32),
    palette: Palette,
    language: Option<String>,
    stream_index: Option<u32>,
    cues: Vec<IdxCue>,
}

impl Index {
    /// Parse the text of an `*.idx` file.
    pub fn parse(input: &str) -> Result<Index> {
        lazy_static! {
            static ref KEY_VALUE: Regex =
                Regex::new("^([A-Za-z/ ]+):\\s*(.*)$").unwrap();
        }

        let mut frame_size = None;
        let mut origin_val = None;
        let mut palette_val = None;
        let mut language = None;
        let mut stream_index = None;
        let mut cues = vec![];

        for (i, line) in input.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cap = match KEY_VALUE.captures(line) {
                Some(cap) => cap,
                None => {
                    trace!("ignoring idx line {}: {:?}", line_no, line);
                    continue;
                }
            };
            let (key, val) = match (cap.get(1), cap.get(2)) {
                (Some(key), Some(val)) => (key.as_str(), val.as_str().trim()),
                _ => continue,
            };
            match key {
                "size" => frame_size = Some(parse_value(line_no, key, val, size)?),
                "org" => origin_val = Some(parse_value(line_no, key, val, origin)?),
                "palette" => palette_val = Some(parse_value(line_no, key, val, palette)?),
                "timestamp" => cues.push(parse_value(line_no, key, val, cue)?),
                "id" => {
                    let (lang, index) = parse_value(line_no, key, val, track_id)?;
                    let lang = lang.trim();
                    if !lang.is_empty() {
                        language = Some(lang.to_owned());
                    }
                    stream_index = index;
                }
                _ => trace!("Unimplemented idx key: {}", key),
            }
        }

        let missing = |key: &str| {
            Error::malformed_index(0, format!("missing required key '{}'", key))
        };
        let index = Index {
            frame_size: frame_size.ok_or_else(|| missing("size"))?,
            origin: origin_val.ok_or_else(|| missing("org"))?,
            palette: palette_val.ok_or_else(|| missing("palette"))?,
            language,
            stream_index,
            cues,
        };
        debug!("parsed idx: {}x{} frame, {} cues",
               index.frame_size.0, index.frame_size.1, index.cues.len());
        Ok(index)
    }

    /// Read and parse an `*.idx` file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Index> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Index::parse(&text)
    }

    /// The size of the video frame, in pixels.
    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    /// The offset applied to all subtitle coordinates.
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    /// Get the palette associated with this `*.idx` file.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// The subtitle language, if the file declares one.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// The track index from the `id` line, if any.
    pub fn stream_index(&self) -> Option<u32> {
        self.stream_index
    }

    /// The `timestamp` entries, in file order.
    pub fn cues(&self) -> &[IdxCue] {
        &self.cues
    }
}

impl FromStr for Index {
    type Err = Error;

    fn from_str(s: &str) -> Result<Index> {
        Index::parse(s)
    }
}

#[cfg(test)]
const EXAMPLE_IDX: &str = "\
# VobSub index file, v7 (do not modify this line!)
#
# Settings

size: 1920x1080
org: 0, 0

# Colors
palette: 000000, f0f0f0, cccccc, 999999, 3333fa, 1111bb, fa3333, bb1111, \
33fa33, 11bb11, fafa33, bbbb11, fa33fa, bb11bb, 33fafa, 11bbbb

custom colors: OFF, tridx: 0000, colors: 000000, 000000, 000000, 000000

langidx: 0

id: en, index: 0
timestamp: 00:00:49:400, filepos: 000000000
timestamp: 00:00:52:600, filepos: 000000800
";

#[test]
fn parse_index() {
    let _ = env_logger::try_init();
    let idx: Index = EXAMPLE_IDX.parse().unwrap();
    assert_eq!(idx.frame_size(), (1920, 1080));
    assert_eq!(idx.origin(), (0, 0));
    assert_eq!(idx.palette()[0], Rgb([0x00, 0x00, 0x00]));
    assert_eq!(idx.palette()[15], Rgb([0x11, 0xbb, 0xbb]));
    assert_eq!(idx.language(), Some("en"));
    assert_eq!(idx.stream_index(), Some(0));
    assert_eq!(idx.cues(), &[
        IdxCue { seconds: 49.4, file_offset: 0 },
        IdxCue { seconds: 52.6, file_offset: 0x800 },
    ]);
}

#[test]
fn cues_are_kept_in_file_order() {
    let idx = Index::parse("size: 720x480\norg: 10,-4\npalette: ffffff\n\
                            timestamp: 00:00:09:000, filepos: 20\n\
                            timestamp: 00:00:01:000, filepos: 10\n").unwrap();
    assert_eq!(idx.origin(), (10, -4));
    assert_eq!(idx.language(), None);
    let offsets: Vec<u64> = idx.cues().iter().map(|c| c.file_offset).collect();
    assert_eq!(offsets, vec![0x20, 0x10]);
}

#[test]
fn missing_palette_is_an_error() {
    let result = Index::parse("size: 720x480\norg: 0, 0\n");
    match result {
        Err(Error::MalformedIndex { message, .. }) => assert!(message.contains("palette")),
        other => panic!("expected malformed index, got {:?}", other),
    }
}

#[test]
fn bad_numbers_are_errors() {
    let result = Index::parse("size: 720xabc\norg: 0, 0\npalette: 000000\n");
    assert!(matches!(result, Err(Error::MalformedIndex { line: 1, .. })));
    let result = Index::parse("size: 720x480\norg: 0, 0\npalette: 000000\n\
                               timestamp: 00:00:0x:000, filepos: 0\n");
    assert!(matches!(result, Err(Error::MalformedIndex { line: 4, .. })));
}

#[test]
fn no_cues_is_fine() {
    let idx = Index::parse("size: 720x480\norg: 0, 0\npalette: 000000\n").unwrap();
    assert!(idx.cues().is_empty());
}
