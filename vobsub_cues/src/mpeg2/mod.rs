//! The `*.sub` portion of VobSub subtitles is packaged in MPEG-2 Program
//! Stream packs, which we split apart and demultiplex just far enough to
//! recover the subtitle packets.

mod clock;
pub mod pes;
pub mod ps;
