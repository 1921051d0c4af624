#![no_main]

use bytes::{Buf, BytesMut};
use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use linewire::protocol::{find_line, LineMode};

#[derive(Debug)]
struct FramingInput {
    strict: bool,
    data: Vec<u8>,
    split_points: Vec<u8>,
}

impl<'a> Arbitrary<'a> for FramingInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let strict: bool = u.arbitrary()?;
        let data: Vec<u8> = u.arbitrary()?;
        let split_points: Vec<u8> = u.arbitrary()?;
        Ok(Self {
            strict,
            data,
            split_points,
        })
    }
}

/// Frame the whole input in one pass
fn frame_at_once(data: &[u8], mode: LineMode) -> (Vec<Vec<u8>>, usize) {
    let mut lines = Vec::new();
    let mut rest = data;
    while let Some(bounds) = find_line(rest, mode, 0) {
        lines.push(rest[..bounds.content_len].to_vec());
        rest = &rest[bounds.consumed..];
    }
    (lines, rest.len())
}

fuzz_target!(|input: FramingInput| {
    if input.data.is_empty() {
        return;
    }
    let mode = if input.strict {
        LineMode::Strict
    } else {
        LineMode::Lenient
    };

    let mut splits: Vec<usize> = input
        .split_points
        .iter()
        .map(|&b| (b as usize) % (input.data.len() + 1))
        .collect();
    splits.push(0);
    splits.push(input.data.len());
    splits.sort_unstable();
    splits.dedup();

    // Feed data in chunks defined by split points, resuming each scan
    let mut buf = BytesMut::new();
    let mut offset = 0;
    let mut lines = Vec::new();
    for window in splits.windows(2) {
        buf.extend_from_slice(&input.data[window[0]..window[1]]);

        while let Some(bounds) = find_line(&buf, mode, offset) {
            assert!(bounds.content_len < bounds.consumed);
            assert!(bounds.consumed <= buf.len());
            lines.push(buf[..bounds.content_len].to_vec());
            buf.advance(bounds.consumed);
            offset = 0;
        }
        offset = mode.resume_offset(buf.len());
    }

    // Framing must not depend on how the bytes were split
    let (expected, leftover) = frame_at_once(&input.data, mode);
    assert_eq!(lines, expected);
    assert_eq!(buf.len(), leftover);
});
