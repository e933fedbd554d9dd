fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bytes::BytesMut;
    use parley_protocol::constants::HEADER_LEN;
    use parley_protocol::{Frame, FrameCodec, Header, MessageKind};
    use serde::Deserialize;
    use tokio_util::codec::{Decoder, Encoder};

    /// One golden vector: header fields, payload, and the exact bytes on
    /// the wire.
    #[derive(Debug, Deserialize)]
    struct Vector {
        header: Header,
        payload_hex: String,
        frame_hex: String,
    }

    impl Vector {
        fn payload(&self) -> Vec<u8> {
            hex::decode(&self.payload_hex).expect("payload_hex")
        }

        fn wire(&self) -> Vec<u8> {
            hex::decode(&self.frame_hex).expect("frame_hex")
        }

        fn frame(&self) -> Frame {
            Frame::new(self.header.kind)
                .with_sender(self.header.sender.clone())
                .with_info(self.header.info.clone())
                .with_payload(self.payload())
        }
    }

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn load_vector(name: &str) -> Vector {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Encodes the vector's fields and decodes its bytes, checking both
    /// directions against the fixture.
    fn golden_test(name: &str) -> Frame {
        let vector = load_vector(name);
        let wire = vector.wire();
        assert_eq!(wire.len(), HEADER_LEN + vector.payload().len(), "{name}: length");
        assert_eq!(
            vector.header.payload_len as usize,
            vector.payload().len(),
            "{name}: payload_len"
        );

        let mut encoded = BytesMut::new();
        FrameCodec::new()
            .encode(vector.frame(), &mut encoded)
            .unwrap_or_else(|e| panic!("failed to encode {name}: {e}"));
        assert_eq!(
            hex::encode(&encoded),
            vector.frame_hex,
            "encode mismatch for {name}"
        );

        let mut buf = BytesMut::from(&wire[..]);
        let decoded = FrameCodec::new()
            .decode(&mut buf)
            .unwrap_or_else(|e| panic!("failed to decode {name}: {e}"))
            .unwrap_or_else(|| panic!("{name}: incomplete frame"));
        assert!(buf.is_empty(), "{name}: trailing bytes");
        assert_eq!(decoded, vector.frame(), "decode mismatch for {name}");
        assert_eq!(decoded.header(), vector.header);

        decoded
    }

    /// Deserializes the fixture's header, re-serializes it, and compares
    /// the JSON values.
    fn header_json_roundtrip(name: &str) {
        let fixture = load_fixture(name);
        let header = fixture["header"].clone();
        let parsed: Header = serde_json::from_value(header.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize header of {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert_eq!(header, reserialized, "header roundtrip mismatch for {name}");
    }

    #[test]
    fn fixture_nickname_new() {
        let frame = golden_test("nickname_new.json");
        assert_eq!(frame.kind, MessageKind::NicknameNew);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn fixture_unicast_send() {
        let frame = golden_test("unicast_send.json");
        assert_eq!(frame.sender, "alice");
        assert_eq!(frame.info, "bob");
        assert_eq!(frame.payload_text(), "hello bob");
    }

    #[test]
    fn fixture_multicast_send_utf8() {
        let frame = golden_test("multicast_send_utf8.json");
        assert_eq!(frame.sender, "zoé");
        assert_eq!(frame.payload_text(), "café ☕");
    }

    #[test]
    fn fixture_file_request() {
        let frame = golden_test("file_request.json");
        assert_eq!(frame.kind, MessageKind::FileRequest);
        assert_eq!(frame.payload_text(), "/home/w/report.pdf");
    }

    #[test]
    fn fixture_error_notice() {
        let frame = golden_test("error_notice.json");
        assert_eq!(frame.kind, MessageKind::Error);
        assert_eq!(frame.kind.tag(), 21);
    }

    #[test]
    fn fixture_unknown_kind() {
        let frame = golden_test("unknown_kind.json");
        assert_eq!(frame.kind, MessageKind::Other(77));
    }

    #[test]
    fn header_json_is_stable() {
        for name in [
            "nickname_new.json",
            "unicast_send.json",
            "multicast_send_utf8.json",
            "file_request.json",
            "error_notice.json",
            "unknown_kind.json",
        ] {
            header_json_roundtrip(name);
        }
    }

    #[test]
    fn legacy_tags_are_frozen() {
        let expected = [
            (0, MessageKind::NicknameNew),
            (3, MessageKind::NicknameDuplicate),
            (5, MessageKind::EchoSend),
            (8, MessageKind::MulticastCreate),
            (13, MessageKind::MulticastSend),
            (15, MessageKind::MulticastNotification),
            (16, MessageKind::FileRequest),
            (20, MessageKind::FileAck),
        ];
        for (tag, kind) in expected {
            assert_eq!(kind.tag(), tag);
            assert_eq!(MessageKind::from_tag(tag), kind);
        }
    }
}
