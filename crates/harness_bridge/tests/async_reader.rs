use harness_bridge::{AsyncNdjsonReader, DecoderConfig, NdjsonDecoder, SchemaValidator};
use serde_json::json;
use tokio::io::AsyncWriteExt;

fn message_decoder() -> NdjsonDecoder<SchemaValidator> {
    NdjsonDecoder::new(
        SchemaValidator::new("type").kind("message", ["text"]),
        DecoderConfig::default(),
    )
}

#[tokio::test]
async fn reads_events_across_writes() {
    let (mut tx, rx) = tokio::io::duplex(16);
    let writer = tokio::spawn(async move {
        tx.write_all(b"{\"type\":\"message\",").await.unwrap();
        tx.write_all(b"\"text\":\"a\"}\nnot json\n{\"type\":\"message\",\"text\":\"b\"}")
            .await
            .unwrap();
    });

    let mut reader = AsyncNdjsonReader::new(rx, message_decoder());
    let mut events = Vec::new();
    while let Some(event) = reader.next_event().await {
        events.push(event.unwrap());
    }
    writer.await.unwrap();

    assert_eq!(
        events,
        vec![
            json!({"type": "message", "text": "a"}),
            json!({"type": "message", "text": "b"})
        ]
    );
    assert_eq!(reader.summary().parsed_count, 2);
    assert_eq!(reader.summary().malformed_line_count, 1);

    let decoder = reader.into_decoder();
    assert_eq!(decoder.stats().malformed, 1);
    assert!(!decoder.has_partial_line());
}

#[tokio::test]
async fn empty_source_yields_nothing() {
    let (tx, rx) = tokio::io::duplex(16);
    drop(tx);

    let mut reader = AsyncNdjsonReader::new(rx, message_decoder());
    assert!(reader.next_event().await.is_none());
    assert!(reader.next_event().await.is_none());
    assert_eq!(reader.summary().lines_processed(), 0);
}
