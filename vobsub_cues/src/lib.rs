//! This crate decodes DVD subtitles in VobSub format, and finds the
//! subtitle which should be on screen at a given time.  VobSub subtitles
//! are typically stored as two files: an `*.idx` file summarizing the
//! subtitles, and an MPEG-2 Program Stream containing the actual subtitle
//! packets.
//!
//! ## Example code
//!
//! ```no_run
//! extern crate image;
//! extern crate vobsub_cues;
//!
//! let cues = vobsub_cues::CueIndex::open("../fixtures/example.idx").unwrap();
//! for sub in &cues {
//!     println!("Time: {:0.3}-{:?}", sub.begin(), sub.end());
//!     println!("Always show: {:?}", sub.force());
//!     let (x, y) = sub.origin();
//!     println!("At: {}, {}", x, y);
//!     let (w, h) = sub.extent();
//!     println!("Size: {}x{}", w, h);
//!     let img: image::RgbaImage = sub.to_image();
//!
//!     // You can save or manipulate `img` using the APIs provided by the Rust
//!     // `image` crate.
//! }
//!
//! // During playback, ask for the subtitle at the current time.
//! if let Some(sub) = cues.lookup(61.5) {
//!     println!("Showing {}x{} subtitle", sub.extent().0, sub.extent().1);
//! }
//! ```
//!
//! ## Decoding pipeline
//!
//! 1. `packs` splits the `*.sub` data into MPEG-2 Program Stream packs.
//! 2. `reassemble` extracts subtitle fragments from the Packetized
//!    Elementary Stream packets inside each pack, and joins them.
//! 3. `Index` parses the `*.idx` file, including the palette and the
//!    `timestamp` entries.
//! 4. `decode_subtitle` reads each subtitle's control sequences and
//!    decompresses its image.
//! 5. `CueIndex` matches subtitles to `timestamp` entries, and sorts them
//!    for fast lookup.
//!
//! Problems with the `*.idx` file or the Program Stream itself are returned
//! as errors.  A damaged subtitle is logged and skipped, so that one bad
//! packet doesn't prevent us from reading the rest of the file.
//!
//! ## Performance
//!
//! Performance in debug mode is poor; compile with `--release` before
//! benchmarking.
//!
//! ## Background & References
//!
//! VobSub subtitles consist of a simple textual `*.idx` file, and a binary
//! `*.sub` file.  The binary `*.sub` file is essentially an MPEG-2 Program
//! Stream containing Packetized Elementary Stream data, but only for a
//! single subtitle track.
//!
//! Useful references include:
//!
//! - [Program Stream](https://en.wikipedia.org/wiki/MPEG_program_stream) (PS)
//! - [Packetized Elementary Stream][PES] (PES)
//! - [DVD subtitles](http://sam.zoy.org/writings/dvd/subtitles/)
//! - [System Time Clock](http://www.bretl.com/mpeghtml/STC.HTM)
//!
//! [PES]: http://dvd.sourceforge.net/dvdinfo/pes-hdr.html

#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod config;
mod control;
mod errors;
mod idx;
mod img;
mod mpeg2;
mod probe;
mod sub;
#[cfg(test)]
mod test_util;
mod timeline;
mod util;

pub use self::config::DecoderConfig;
pub use self::control::{Control, Coordinates};
pub use self::errors::{Error, Result};
pub use self::idx::{IdxCue, Index, Palette};
pub use self::mpeg2::pes::{reassemble, RawSubtitleUnit, PRIVATE_STREAM_1};
pub use self::mpeg2::ps::{packs, Pack, Packs, PACK_START_CODE};
pub use self::probe::{is_idx_file, is_sub_file};
pub use self::sub::{decode_indexed, decode_subtitle, DecodedSubtitle};
pub use self::timeline::CueIndex;
