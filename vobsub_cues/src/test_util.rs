//! Builders for synthetic `*.sub` data, used by our unit tests.

/// A valid 14-byte MPEG-2 pack header with no stuffing.
const PACK_HEADER: [u8; 14] = [
    0x00, 0x00, 0x01, 0xba, 0x44, 0x00, 0x04, 0x00, 0x04, 0x01, 0x01, 0x89, 0xc3, 0xf8,
];

/// Build a pack containing `packets`.
pub(crate) fn pack(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = PACK_HEADER.to_vec();
    for packet in packets {
        out.extend_from_slice(packet);
    }
    out
}

/// Encode a 90kHz time stamp as a 5-byte PTS field.
fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x21 | ((pts >> 29) & 0x0e) as u8,
        (pts >> 22) as u8,
        ((pts >> 14) & 0xfe) as u8 | 1,
        (pts >> 7) as u8,
        ((pts << 1) & 0xfe) as u8 | 1,
    ]
}

/// Build a private stream 1 PES packet.
pub(crate) fn private_pes(pts: Option<u64>, substream_id: u8, data: &[u8]) -> Vec<u8> {
    let mut body = vec![0x81];
    match pts {
        Some(pts) => {
            body.extend_from_slice(&[0x80, 0x05]);
            body.extend_from_slice(&pts_bytes(pts));
        }
        None => body.extend_from_slice(&[0x00, 0x00]),
    }
    body.push(substream_id);
    body.extend_from_slice(data);

    let mut out = vec![0x00, 0x00, 0x01, 0xbd];
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend(body);
    out
}

/// Build a padding stream PES packet.
pub(crate) fn padding_pes(len: u16) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x01, 0xbe];
    out.extend_from_slice(&len.to_be_bytes());
    out.extend(std::iter::repeat(0xff).take(usize::from(len)));
    out
}

/// Control commands which set up a complete subtitle: start at the
/// sequence's date, with the given coordinates, palette, and alpha, and
/// with even scan lines at 4 and odd scan lines at `4 + even_len`.
pub(crate) fn display_commands(
    (x1, x2, y1, y2): (u16, u16, u16, u16),
    palette: [u8; 4],
    alpha: [u8; 4],
    even_len: usize,
) -> Vec<u8> {
    let odd = (4 + even_len) as u16;
    vec![
        0x01,
        0x03, palette[0] << 4 | palette[1], palette[2] << 4 | palette[3],
        0x04, alpha[0] << 4 | alpha[1], alpha[2] << 4 | alpha[3],
        0x05,
        (x1 >> 4) as u8, ((x1 & 0xf) << 4 | x2 >> 8) as u8, x2 as u8,
        (y1 >> 4) as u8, ((y1 & 0xf) << 4 | y2 >> 8) as u8, y2 as u8,
        0x06, 0x00, 0x04, (odd >> 8) as u8, odd as u8,
    ]
}

/// Build a complete subtitle packet: a 4-byte header, the even and odd
/// scan lines, then one control sequence per `(date, commands)` pair.
/// Each sequence gets a trailing END command, and the last one points at
/// itself.
pub(crate) fn subtitle_packet(even: &[u8], odd: &[u8], sequences: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let data_packet_size = 4 + even.len() + odd.len();
    let mut out = vec![0, 0];
    out.extend_from_slice(&(data_packet_size as u16).to_be_bytes());
    out.extend_from_slice(even);
    out.extend_from_slice(odd);

    for (i, &(date, ref commands)) in sequences.iter().enumerate() {
        let here = out.len();
        let next = if i + 1 == sequences.len() {
            here
        } else {
            here + 4 + commands.len() + 1
        };
        out.extend_from_slice(&date.to_be_bytes());
        out.extend_from_slice(&(next as u16).to_be_bytes());
        out.extend_from_slice(commands);
        out.push(0xff);
    }

    let total = out.len() as u16;
    out[0..2].copy_from_slice(&total.to_be_bytes());
    out
}
