fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use gantry_protocol::constants::MessageType;
    use gantry_protocol::envelope::Message;
    use gantry_protocol::frame::{encode_chunk_frame, parse_chunk_frame};
    use gantry_protocol::messages::{
        ChunkAck, MergeRequest, MergeResult, VerifyRequest, VerifyResponse, VerifyStatus,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as raw JSON text.
    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and
    /// compares the JSON values (order- and whitespace-independent).
    ///
    /// The fixtures are golden copies of real frames; a mismatch here
    /// means a serde attribute changed the wire format.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let raw = read_fixture(name);
        let parsed: T = serde_json::from_str(&raw)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized_str = serde_json::to_string(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        let fixture: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let reserialized: serde_json::Value = serde_json::from_str(&reserialized_str).unwrap();
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {raw}\n  Rust:    {reserialized_str}"
        );
    }

    // --- Envelope fixtures (also pin the type kind strings) ---

    #[test]
    fn fixture_message_verify_request() {
        roundtrip_test::<Message>("message_verify_request.json");

        let msg: Message =
            serde_json::from_str(&read_fixture("message_verify_request.json")).unwrap();
        assert_eq!(msg.id, "req-1");
        assert_eq!(msg.msg_type, MessageType::FileVerify);

        let req: VerifyRequest = msg.parse_payload().unwrap().unwrap();
        assert_eq!(req.total, 6);
        assert_eq!(req.chunk_size, 2097152);
        assert_eq!(req.hash, "a".repeat(64));
        assert_eq!(req.name, "video.mp4");
    }

    #[test]
    fn fixture_message_verified_progress() {
        roundtrip_test::<Message>("message_verified_progress.json");

        let msg: Message =
            serde_json::from_str(&read_fixture("message_verified_progress.json")).unwrap();
        assert_eq!(msg.msg_type, MessageType::FileVerified);

        let resp: VerifyResponse = msg.parse_payload().unwrap().unwrap();
        assert_eq!(resp.status, VerifyStatus::Progress);
        assert_eq!(resp.index, Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn fixture_message_uploaded_ack() {
        roundtrip_test::<Message>("message_uploaded_ack.json");

        let msg: Message =
            serde_json::from_str(&read_fixture("message_uploaded_ack.json")).unwrap();
        assert_eq!(msg.msg_type, MessageType::FileUploaded);

        let ack: ChunkAck = msg.parse_payload().unwrap().unwrap();
        assert!(ack.success);
        assert_eq!(ack.data, Some(3));
        assert!(ack.msg.is_empty());
    }

    #[test]
    fn fixture_message_merge_request() {
        roundtrip_test::<Message>("message_merge_request.json");

        let msg: Message =
            serde_json::from_str(&read_fixture("message_merge_request.json")).unwrap();
        assert_eq!(msg.msg_type, MessageType::FileMerge);

        let req: MergeRequest = msg.parse_payload().unwrap().unwrap();
        assert_eq!(req.total, 6);
        assert_eq!(req.name, "video.mp4");
    }

    #[test]
    fn fixture_message_success() {
        roundtrip_test::<Message>("message_success.json");

        let msg: Message = serde_json::from_str(&read_fixture("message_success.json")).unwrap();
        assert_eq!(msg.msg_type, MessageType::FileSuccess);

        let result: MergeResult = msg.parse_payload().unwrap().unwrap();
        assert!(result.success);
        assert_eq!(result.data, format!("{}.mp4", "a".repeat(64)));
    }

    #[test]
    fn fixture_message_error() {
        roundtrip_test::<Message>("message_error.json");

        let msg: Message = serde_json::from_str(&read_fixture("message_error.json")).unwrap();
        assert_eq!(msg.msg_type, MessageType::Error);
        assert!(msg.payload.is_none());

        let err = msg.error.expect("error details present");
        assert_eq!(err.code, 501);
        assert_eq!(err.message, "not implemented");
    }

    // --- Bare payload fixtures ---

    #[test]
    fn fixture_verify_response_existing() {
        roundtrip_test::<VerifyResponse>("verify_response_existing.json");

        let resp: VerifyResponse =
            serde_json::from_str(&read_fixture("verify_response_existing.json")).unwrap();
        assert_eq!(resp.status, VerifyStatus::Existing);
        assert!(resp.index.is_none(), "missing index should default to None");
    }

    #[test]
    fn fixture_chunk_ack_rejected() {
        roundtrip_test::<ChunkAck>("chunk_ack_rejected.json");

        let ack: ChunkAck = serde_json::from_str(&read_fixture("chunk_ack_rejected.json")).unwrap();
        assert!(!ack.success);
        assert_eq!(ack.data, Some(9));
        assert!(ack.msg.contains("out of range"));
    }

    #[test]
    fn fixture_merge_result_failed() {
        roundtrip_test::<MergeResult>("merge_result_failed.json");

        let result: MergeResult =
            serde_json::from_str(&read_fixture("merge_result_failed.json")).unwrap();
        assert!(!result.success);
        assert!(result.data.is_empty(), "missing data should default to empty");
        assert!(result.msg.contains("mismatch"));
    }

    // --- Binary chunk frame fixture ---

    #[test]
    fn fixture_chunk_frame_binary() {
        let path = fixtures_dir().join("chunk_frame.bin");
        let frame = fs::read(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));

        let (header, data) = parse_chunk_frame(&frame).expect("fixture frame parses");
        assert_eq!(header.id, "c-42");
        assert_eq!(header.msg_type, MessageType::FileUpload);
        assert_eq!(header.hash, "a".repeat(64));
        assert_eq!(header.chunk_size, 2097152);
        assert_eq!(header.chunk_count, 6);
        assert_eq!(header.total_size, 12582912);
        assert_eq!(header.name, "video.mp4");
        assert_eq!(header.index, 3);
        assert_eq!(data, b"0123456789abcdef");

        // Encoding the parsed header and bytes must reproduce the fixture
        // exactly, length prefix included.
        let reencoded = encode_chunk_frame(&header, &data).unwrap();
        assert_eq!(reencoded, frame, "binary frame encoding drifted");
    }

    // --- Tolerant parsing: fields other ends may omit ---

    #[test]
    fn chunk_ack_without_optional_fields() {
        let json = r#"{"hash":"deadbeef","success":true}"#;
        let ack: ChunkAck = serde_json::from_str(json).unwrap();
        assert_eq!(ack.data, None, "missing data should default to None");
        assert!(ack.msg.is_empty(), "missing msg should default to empty");
    }

    #[test]
    fn unknown_message_type_is_tolerated() {
        let json = r#"{"id":"x-1","type":"file/preview","payload":{"foo":1}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.msg_type, MessageType::Unknown);
        assert!(msg.payload.is_some());
    }

    #[test]
    fn keepalive_kind_strings() {
        assert_eq!(serde_json::to_string(&MessageType::Ping).unwrap(), "\"ping\"");
        assert_eq!(serde_json::to_string(&MessageType::Pong).unwrap(), "\"pong\"");
    }
}
