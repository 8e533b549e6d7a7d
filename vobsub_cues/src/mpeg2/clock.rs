//! The 90kHz clock used by MPEG-2 time stamps.

use nom::IResult;
use std::fmt;

use crate::util::{bit_field, BitInput};

/// Ticks per second of the MPEG-2 system clock base.
const CLOCK_HZ: f64 = 90_000.0;

/// A 33-bit time stamp, as found in PES headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    value: u64,
}

impl Clock {
    /// Construct a clock from its raw 90kHz tick count.
    pub fn base(value: u64) -> Clock {
        Clock { value }
    }

    /// The time stamp in seconds.
    pub fn to_seconds(self) -> f64 {
        self.value as f64 / CLOCK_HZ
    }

    /// Parse a PTS or DTS field: a 4-bit prefix, then 33 bits split into
    /// 3, 15 and 15 bit pieces, each followed by a marker bit.
    pub fn parse_bits(input: BitInput) -> IResult<BitInput, Clock> {
        let (input, _prefix) = bit_field::<u8>(input, 4)?;
        let (input, high) = bit_field::<u64>(input, 3)?;
        let (input, _marker) = bit_field::<u8>(input, 1)?;
        let (input, middle) = bit_field::<u64>(input, 15)?;
        let (input, _marker) = bit_field::<u8>(input, 1)?;
        let (input, low) = bit_field::<u64>(input, 15)?;
        let (input, _marker) = bit_field::<u8>(input, 1)?;
        Ok((input, Clock::base(high << 30 | middle << 15 | low)))
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds())
    }
}

#[test]
fn parse_clock() {
    let input = &[0x21, 0x00, 0xab, 0xe9, 0xc1][..];
    let (rest, clock) = Clock::parse_bits((input, 0)).unwrap();
    assert_eq!(rest, (&[][..], 0));
    assert_eq!(clock, Clock::base(2815200));
    assert_eq!(format!("{}", clock), "31.280s");

    // The top three bits live in the first byte.
    let (_, clock) = Clock::parse_bits((&[0x2f, 0xff, 0xff, 0xff, 0xff][..], 0)).unwrap();
    assert_eq!(clock, Clock::base((1 << 33) - 1));
}
