//! # Looking up subtitles by time.
//!
//! A `CueIndex` joins the subtitle packets in a `*.sub` file to the
//! `timestamp` entries in the matching `*.idx` file, decodes them, and
//! keeps them sorted so we can find the subtitle visible at a given time.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::slice;

use crate::config::DecoderConfig;
use crate::errors::{Error, Result};
use crate::idx::Index;
use crate::mpeg2::pes::{reassemble, RawSubtitleUnit};
use crate::mpeg2::ps::packs;
use crate::sub::{decode_subtitle, DecodedSubtitle};

/// Decoded subtitles, sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    subtitles: Vec<DecodedSubtitle>,
}

impl CueIndex {
    /// Decode all the subtitles in `sub_data` which have a matching cue in
    /// `index`, using the default configuration.
    pub fn new(sub_data: &[u8], index: &Index) -> Result<CueIndex> {
        CueIndex::with_config(sub_data, index, &DecoderConfig::default())
    }

    /// Decode all the subtitles in `sub_data` which have a matching cue in
    /// `index`.
    ///
    /// Problems with the container are returned as errors.  Problems with
    /// an individual subtitle are logged, and that subtitle is skipped.
    pub fn with_config(
        sub_data: &[u8],
        index: &Index,
        config: &DecoderConfig,
    ) -> Result<CueIndex> {
        let units = reassemble(packs(sub_data), config)?;
        Ok(CueIndex::from_units(units, index, config))
    }

    /// Build an index from subtitle units which have already been
    /// reassembled.
    pub fn from_units<I>(units: I, index: &Index, config: &DecoderConfig) -> CueIndex
    where
        I: IntoIterator<Item = RawSubtitleUnit>,
    {
        let mut cues: HashMap<u64, f64> = HashMap::with_capacity(index.cues().len());
        for cue in index.cues() {
            if cues.insert(cue.file_offset, cue.seconds).is_some() {
                debug!("duplicate cue for offset 0x{:x}, using the last one", cue.file_offset);
            }
        }

        let mut subtitles = vec![];
        for unit in units {
            // Each cue is used at most once.
            let seconds = match cues.remove(&unit.offset) {
                Some(seconds) => seconds,
                None => {
                    debug!("no cue for subtitle at 0x{:x}, skipping", unit.offset);
                    continue;
                }
            };
            match decode_subtitle(&unit.payload, index.palette(), config) {
                Ok(sub) => subtitles.push(sub.shifted(seconds, index.origin())),
                Err(err) => warn!("skipping subtitle at 0x{:x}: {}", unit.offset, err),
            }
        }
        for offset in cues.keys() {
            debug!("no subtitle found for cue at 0x{:x}", offset);
        }

        subtitles.sort_by(|a, b| a.begin().total_cmp(&b.begin()));
        debug!("decoded {} subtitles", subtitles.len());
        CueIndex { subtitles }
    }

    /// Open an `*.idx` file and the `*.sub` file next to it.
    pub fn open<P: AsRef<Path>>(idx_path: P) -> Result<CueIndex> {
        let idx_path = idx_path.as_ref();
        let index = Index::open(idx_path)?;
        let sub_path = idx_path.with_extension("sub");
        let sub_data = fs::read(&sub_path).map_err(|err| Error::io(sub_path, err))?;
        CueIndex::new(&sub_data, &index)
    }

    /// Find the subtitle which should be on screen at `time`, if any.
    ///
    /// This takes the last subtitle starting at or before `time`, and
    /// returns it if it has not ended yet.
    pub fn lookup(&self, time: f64) -> Option<&DecodedSubtitle> {
        let count = self.subtitles.partition_point(|sub| sub.begin() <= time);
        let candidate = self.subtitles[..count].last()?;
        if candidate.contains(time) {
            Some(candidate)
        } else {
            None
        }
    }

    /// All our subtitles, in order.
    pub fn subtitles(&self) -> &[DecodedSubtitle] {
        &self.subtitles
    }

    /// Iterate over our subtitles, in order.
    pub fn iter(&self) -> slice::Iter<'_, DecodedSubtitle> {
        self.subtitles.iter()
    }

    /// The number of subtitles.
    pub fn len(&self) -> usize {
        self.subtitles.len()
    }

    /// Do we have any subtitles at all?
    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty()
    }
}

impl<'a> IntoIterator for &'a CueIndex {
    type Item = &'a DecodedSubtitle;
    type IntoIter = slice::Iter<'a, DecodedSubtitle>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
use crate::test_util::{display_commands, subtitle_packet};

/// A 2x1 subtitle starting at `start` and ending at `stop`, both in
/// 1/100ths of a second.
#[cfg(test)]
fn timed_packet(start: u16, stop: Option<u16>) -> Vec<u8> {
    let even = [0xa0];
    let mut sequences = vec![(start, display_commands(
        (0, 1, 0, 0), [0, 1, 2, 3], [0, 0xf, 0xf, 0xf], even.len()))];
    if let Some(stop) = stop {
        sequences.push((stop, vec![0x02]));
    }
    subtitle_packet(&even, &[], &sequences)
}

#[cfg(test)]
fn unit(offset: u64, payload: Vec<u8>) -> RawSubtitleUnit {
    RawSubtitleUnit { offset, pts: None, payload }
}

#[cfg(test)]
const TIMELINE_IDX: &str = "\
size: 720x480
org: 10, 20
palette: 000000, ffffff, 808080, c0c0c0
timestamp: 00:00:10:000, filepos: 000000000
timestamp: 00:00:01:000, filepos: 000000800
timestamp: 00:00:20:000, filepos: 000001000
timestamp: 00:00:30:000, filepos: 000001800
";

#[cfg(test)]
fn timeline() -> CueIndex {
    let _ = env_logger::try_init();
    let index = Index::parse(TIMELINE_IDX).unwrap();
    let units = vec![
        unit(0x0000, timed_packet(0, Some(200))),
        unit(0x0800, timed_packet(0, Some(150))),
        // No end time, so this stays up until the next subtitle.
        unit(0x1000, timed_packet(50, None)),
        // Not listed in the index.
        unit(0x1400, timed_packet(0, Some(100))),
        // Broken, so it gets dropped.
        unit(0x1800, vec![0x00, 0x08, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04]),
    ];
    CueIndex::from_units(units, &index, &DecoderConfig::default())
}

#[test]
fn subtitles_are_sorted_and_filtered() {
    let timeline = timeline();
    assert_eq!(timeline.len(), 3);
    let begins = timeline.iter().map(|sub| sub.begin()).collect::<Vec<_>>();
    assert_eq!(begins, vec![1.0, 10.0, 20.5]);
    let ends = timeline.iter().map(|sub| sub.end()).collect::<Vec<_>>();
    assert_eq!(ends, vec![Some(2.5), Some(12.0), None]);
    for sub in &timeline {
        assert_eq!(sub.origin(), (10, 20));
    }
}

#[test]
fn lookup_respects_display_windows() {
    let timeline = timeline();
    assert!(timeline.lookup(0.5).is_none());
    assert_eq!(timeline.lookup(1.0).map(|s| s.begin()), Some(1.0));
    assert_eq!(timeline.lookup(2.49).map(|s| s.begin()), Some(1.0));
    assert!(timeline.lookup(2.5).is_none());
    assert!(timeline.lookup(9.99).is_none());
    assert_eq!(timeline.lookup(11.0).map(|s| s.begin()), Some(10.0));
    assert!(timeline.lookup(12.0).is_none());
    assert!(timeline.lookup(20.0).is_none());
    assert_eq!(timeline.lookup(20.5).map(|s| s.begin()), Some(20.5));
    assert_eq!(timeline.lookup(1.0e6).map(|s| s.begin()), Some(20.5));
}

#[test]
fn empty_timeline() {
    let timeline = CueIndex::default();
    assert!(timeline.is_empty());
    assert!(timeline.lookup(0.0).is_none());
}

#[test]
fn lookup_is_repeatable() {
    let timeline = timeline();
    let first = timeline.lookup(11.0).cloned();
    let second = timeline.lookup(11.0).cloned();
    assert_eq!(first, second);
    assert_eq!(timeline.subtitles().len(), 3);
}

#[test]
fn new_decodes_a_program_stream() {
    use crate::test_util::{pack, private_pes};

    let mut sub_data = pack(&[private_pes(Some(0), 0x20, &timed_packet(0, Some(100)))]);
    let second = sub_data.len();
    sub_data.extend(pack(&[private_pes(Some(90_000), 0x20, &timed_packet(0, None))]));

    let idx = format!(
        "size: 720x480\norg: 0, 0\npalette: 000000, ffffff\n\
         timestamp: 00:00:00:000, filepos: 000000000\n\
         timestamp: 00:00:01:000, filepos: {:09x}\n",
        second,
    );
    let index = Index::parse(&idx).unwrap();
    let timeline = CueIndex::new(&sub_data, &index).unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline.lookup(0.5).map(|s| s.pixels()[0]), Some(0xff));
    assert_eq!(timeline.lookup(1.5).map(|s| s.begin()), Some(1.0));
}
