//! Decoder settings.

/// Settings shared by the demultiplexer and the bitmap decoder.
///
/// ```
/// use vobsub_cues::DecoderConfig;
///
/// let config = DecoderConfig::new()
///     .with_subtitle_stream(1)
///     .with_check_subtitle_size(false);
/// assert_eq!(config.subtitle_stream(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    subtitle_stream: u8,
    check_subtitle_size: bool,
}

impl DecoderConfig {
    /// The default configuration: subtitle stream 0, with size checks.
    pub fn new() -> Self {
        Self {
            subtitle_stream: 0,
            check_subtitle_size: true,
        }
    }

    /// Only keep subtitles from this stream.  DVDs number their subtitle
    /// tracks 0x20 to 0x3f inside private stream 1, and we compare against
    /// the low 5 bits of that id.
    pub fn with_subtitle_stream(mut self, stream: u8) -> Self {
        self.subtitle_stream = stream & 0x1f;
        self
    }

    /// Should we reject subtitles which are shorter than the size declared
    /// in their own header?
    pub fn with_check_subtitle_size(mut self, check: bool) -> Self {
        self.check_subtitle_size = check;
        self
    }

    /// The subtitle stream index we accept.
    pub fn subtitle_stream(&self) -> u8 {
        self.subtitle_stream
    }

    /// Are declared subtitle sizes enforced?
    pub fn check_subtitle_size(&self) -> bool {
        self.check_subtitle_size
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn subtitle_stream_is_masked() {
    let config = DecoderConfig::new().with_subtitle_stream(0x21);
    assert_eq!(config.subtitle_stream(), 1);
    assert!(config.check_subtitle_size());
}
