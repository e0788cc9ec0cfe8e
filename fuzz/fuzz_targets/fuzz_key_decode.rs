#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use lexkey::index::Key;

fuzz_target!(|data: &[u8]| {
    // Arbitrary page bytes: decoding must fail cleanly or yield a key that
    // re-encodes to the bytes it consumed
    if let Ok((key, used)) = Key::decode(data) {
        let mut buf = Vec::new();
        key.encode_into(&mut buf);
        assert_eq!(buf.len(), used);
        assert_eq!(&buf[..], &data[..used]);
    }

    let page = Bytes::copy_from_slice(data);
    let mut offset = 0;
    while let Ok((key, used)) = Key::decode_shared(&page, offset) {
        let _ = key.materialize();
        offset += used;
        if used == 0 {
            break;
        }
    }
});
