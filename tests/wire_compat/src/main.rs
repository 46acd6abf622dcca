fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use folio_protocol::{
        ApiError, CompleteUploadRequest, ConfirmedChunksResponse, FileRecord, ProgressSnapshot,
        ResumeToken, StartUploadRequest, StartUploadResponse, UploadChunkRequest,
        UploadChunkResponse, UploadStatus,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON numbers so that `65` and `65.0` compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_start_upload_request() {
        let req: StartUploadRequest = roundtrip_test("start_upload_request.json");
        assert_eq!(req.chunk_size, 5 * 1024 * 1024);
    }

    #[test]
    fn fixture_start_upload_response() {
        let resp: StartUploadResponse = roundtrip_test("start_upload_response.json");
        assert_eq!(resp.chunk_targets.len(), 5);
    }

    #[test]
    fn fixture_upload_chunk_request_payload_is_base64() {
        let req: UploadChunkRequest = roundtrip_test("upload_chunk_request.json");
        assert_eq!(req.payload, b"%PDF-1.4\n");
    }

    #[test]
    fn fixture_upload_chunk_response() {
        let resp: UploadChunkResponse = roundtrip_test("upload_chunk_response.json");
        assert_eq!(resp.next_chunk_hint, Some(4));
    }

    #[test]
    fn fixture_confirmed_chunks_response() {
        let resp: ConfirmedChunksResponse = roundtrip_test("confirmed_chunks_response.json");
        assert_eq!(resp.uploaded_chunks, vec![0, 1, 3]);
    }

    #[test]
    fn fixture_complete_upload_request() {
        roundtrip_test::<CompleteUploadRequest>("complete_upload_request.json");
    }

    #[test]
    fn fixture_file_record() {
        let record: FileRecord = roundtrip_test("file_record.json");
        assert!(record.uploaded_at.is_some());
    }

    #[test]
    fn fixture_api_error() {
        roundtrip_test::<ApiError>("api_error.json");
    }

    #[test]
    fn fixture_progress_snapshot() {
        let snap: ProgressSnapshot = roundtrip_test("progress_snapshot.json");
        assert_eq!(snap.current_chunk, snap.uploaded_chunks);
    }

    #[test]
    fn fixture_resume_token_survives_encoding() {
        let token: ResumeToken = roundtrip_test("resume_token.json");
        assert_eq!(ResumeToken::decode(&token.encode()).unwrap(), token);
    }

    #[test]
    fn minimal_start_response_omits_optional_fields() {
        let json = r#"{"uploadId":"u","resumeToken":"t"}"#;
        let resp: StartUploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.chunk_size, 0);
        assert!(resp.chunk_targets.is_empty());
        assert_eq!(serde_json::to_string(&resp).unwrap(), json);
    }

    #[test]
    fn status_values_are_lowercase() {
        let all = [
            (UploadStatus::Pending, "\"pending\""),
            (UploadStatus::Uploading, "\"uploading\""),
            (UploadStatus::Paused, "\"paused\""),
            (UploadStatus::Completed, "\"completed\""),
            (UploadStatus::Failed, "\"failed\""),
            (UploadStatus::Cancelled, "\"cancelled\""),
        ];
        for (status, json) in all {
            assert_eq!(serde_json::to_string(&status).unwrap(), json);
        }
    }
}
