extern crate env_logger;
extern crate glob;
#[macro_use]
extern crate log;
extern crate vobsub_cues;

use std::fs;
use std::path::Path;

use vobsub_cues::{CueIndex, DecoderConfig, Error, Index};

fn glob_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

const PACK_HEADER: [u8; 14] = [
    0x00, 0x00, 0x01, 0xba, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xc3, 0xf8,
];

/// A pack holding a single private stream 1 packet for subtitle stream 0,
/// with a PTS of 0.
fn subtitle_pack(packet: &[u8]) -> Vec<u8> {
    let mut body = vec![0x81, 0x80, 0x05, 0x21, 0x00, 0x01, 0x00, 0x01, 0x20];
    body.extend_from_slice(packet);
    let mut out = PACK_HEADER.to_vec();
    out.extend_from_slice(&[0x00, 0x00, 0x01, 0xbd]);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend(body);
    out
}

/// A 2x1 subtitle at (0, 0), painted with local color 1, with no end time.
const TWO_PIXEL_SUBTITLE: [u8; 29] = [
    // Size, and offset of control sequences.
    0x00, 0x1d, 0x00, 0x05,
    // Even lines: a run of 2 pixels in raw color 2.
    0xa0,
    // Control sequence: date 0, last in chain.
    0x00, 0x00, 0x00, 0x05,
    0x01,
    0x03, 0x01, 0x23,
    0x04, 0x0f, 0xff,
    0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    0x06, 0x00, 0x04, 0x00, 0x05,
    0xff,
];

#[test]
fn lookup_example_subtitle() {
    let _ = env_logger::try_init();

    let idx = "\
# VobSub index file, v7 (do not modify this line!)
size: 720x480
org: 0,0
palette: 000000,FFFFFF,808080,C0C0C0
timestamp: 00:00:05:000, filepos: 0x10
";
    let index = Index::parse(idx).unwrap();

    // Pad the first pack so the subtitle starts at 0x10.
    let mut sub_data = PACK_HEADER.to_vec();
    sub_data.extend_from_slice(&[0xff, 0xff]);
    sub_data.extend(subtitle_pack(&TWO_PIXEL_SUBTITLE));

    let cues = CueIndex::new(&sub_data, &index).unwrap();
    assert_eq!(cues.len(), 1);

    let sub = cues.lookup(5.0).expect("subtitle at 5s");
    assert_eq!(sub.begin(), 5.0);
    assert_eq!(sub.end(), None);
    assert_eq!(sub.origin(), (0, 0));
    assert_eq!(sub.extent(), (2, 1));
    assert_eq!(sub.pixels(), &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff][..]);
    assert!(cues.lookup(4.9).is_none());
}

#[test]
fn other_subtitle_streams_are_ignored() {
    let index = Index::parse("size: 720x480\norg: 0,0\npalette: 000000,FFFFFF\n\
                              timestamp: 00:00:05:000, filepos: 0x0\n").unwrap();
    let sub_data = subtitle_pack(&TWO_PIXEL_SUBTITLE);
    let config = DecoderConfig::new().with_subtitle_stream(1);
    let cues = CueIndex::with_config(&sub_data, &index, &config).unwrap();
    assert!(cues.is_empty());
}

#[test]
fn truncated_pack_is_an_error() {
    let index = Index::parse("size: 720x480\norg: 0,0\npalette: 000000\n").unwrap();
    let result = CueIndex::new(&PACK_HEADER[..8], &index);
    assert!(matches!(result, Err(Error::TruncatedStream { .. })));
}

#[test]
fn open_example_files() {
    let _ = env_logger::try_init();
    assert!(vobsub_cues::is_idx_file("../fixtures/example.idx").unwrap());
    assert!(vobsub_cues::is_sub_file("../fixtures/example.sub").unwrap());

    let index = Index::open("../fixtures/example.idx").unwrap();
    assert_eq!(index.frame_size(), (720, 480));
    assert_eq!(index.language(), Some("en"));
    assert_eq!(index.cues().len(), 2);

    let cues = CueIndex::open("../fixtures/example.idx").unwrap();
    let times = cues.iter().map(|s| (s.begin(), s.end())).collect::<Vec<_>>();
    assert_eq!(times, vec![(5.0, Some(7.0)), (61.5, None)]);
    assert!(cues.lookup(7.0).is_none());
    assert_eq!(cues.lookup(100.0).map(|s| s.begin()), Some(61.5));

    let img = cues.subtitles()[0].to_image();
    assert_eq!(img.dimensions(), (2, 1));
    assert_eq!(img.get_pixel(0, 0).0, [0xff, 0xff, 0xff, 0xff]);
}

#[test]
fn open_reports_errors() {
    let result = CueIndex::open("../fixtures/invalid/missing_org.idx");
    assert!(matches!(result, Err(Error::MalformedIndex { .. })));
    let result = CueIndex::open("../fixtures/no_such_file.idx");
    assert!(matches!(result, Err(Error::Io { .. })));
}

// Each of these files is missing a required directive, or contains a value
// we can't parse.
#[test]
fn invalid_index_corpus() {
    let _ = env_logger::try_init();

    let mut count = 0;
    for entry in glob::glob_with("../fixtures/invalid/*.idx", glob_options()).unwrap() {
        let entry = entry.unwrap();
        debug!("Processing {}", entry.display());
        match Index::open(&entry) {
            Err(Error::MalformedIndex { .. }) => count += 1,
            other => panic!("expected {} to be malformed, got {:?}", entry.display(), other),
        }
    }
    assert!(count > 0);
}

// To run this test, use `cargo test -- --ignored`.  This tests against a
// larger selection of *.idx/*.sub files in our private corpus, which is
// unfortunately not open source.
#[test]
#[ignore]
fn private_corpus() {
    let _ = env_logger::try_init();

    for entry in glob::glob_with("../private/**/*.idx", glob_options()).unwrap() {
        let entry = entry.unwrap();
        process_file(&entry);
    }
}

fn process_file(path: &Path) {
    debug!("Processing {}", path.display());
    let index = Index::open(path).unwrap();
    let sub_data = fs::read(path.with_extension("sub")).unwrap();
    let cues = CueIndex::new(&sub_data, &index).unwrap();
    let begins = cues.iter().map(|s| s.begin()).collect::<Vec<_>>();
    assert!(begins.windows(2).all(|pair| pair[0] <= pair[1]));
    for sub in &cues {
        let (w, h) = sub.extent();
        assert_eq!(sub.pixels().len(), w as usize * h as usize * 4);
    }
    debug!("Found {} subtitles", cues.len());
}
