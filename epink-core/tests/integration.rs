//! Integration tests: a full panel update from canvas to broker records
//! and back, plus failure scenarios at each stage boundary.

use std::sync::Arc;
use std::time::Duration;

use epink_core::{
    AesGcmEnvelope, Canvas, ChunkAssembler, ChunkPolicy, ChunkRecord, ChunkTransport, Codec,
    EpinkError, MemoryPublisher, Pipeline, PipelineConfig, PixelFormat, Rgb,
};

// ── Helpers ──────────────────────────────────────────────────────

const KEY: [u8; 32] = [0x5A; 32];

fn sender(
    width: u32,
    height: u32,
    config: &PipelineConfig,
    transport: ChunkTransport<Arc<MemoryPublisher>>,
) -> Pipeline<AesGcmEnvelope, Arc<MemoryPublisher>> {
    Pipeline::new(
        PixelFormat::three_color(width, height).unwrap(),
        config,
        AesGcmEnvelope::new(&KEY).unwrap(),
        transport,
    )
    .unwrap()
}

fn memory_transport() -> (ChunkTransport<Arc<MemoryPublisher>>, Arc<MemoryPublisher>) {
    let publisher = Arc::new(MemoryPublisher::new());
    let transport = ChunkTransport::new(Arc::clone(&publisher)).with_pace(Duration::ZERO);
    (transport, publisher)
}

/// Reassemble everything the publisher saw, the way the gateway would.
fn reassemble(publisher: &MemoryPublisher) -> epink_core::CipherBlob {
    let mut assembler = ChunkAssembler::new();
    for (_, payload) in publisher.messages() {
        let record = ChunkRecord::from_json(&payload).unwrap();
        assembler.accept(&record).unwrap();
    }
    assembler.assemble().unwrap()
}

/// Badge-style test card: white field, black frame, red band.
fn badge(width: u32, height: u32) -> Canvas {
    let mut canvas = Canvas::filled(width, height, Rgb::WHITE);
    for x in 0..width {
        canvas.set_pixel(x, 0, Rgb::BLACK);
        canvas.set_pixel(x, height - 1, Rgb::BLACK);
    }
    for y in 0..height {
        canvas.set_pixel(0, y, Rgb::BLACK);
        canvas.set_pixel(width - 1, y, Rgb::BLACK);
    }
    for x in 4..width - 4 {
        canvas.set_pixel(x, height / 2, Rgb::new(0, 0, 255));
    }
    canvas
}

// ── Full round trip ──────────────────────────────────────────────

#[tokio::test]
async fn test_panel_update_round_trip() {
    let (transport, publisher) = memory_transport();
    let pipeline = sender(120, 40, &PipelineConfig::default(), transport);
    let canvas = badge(120, 40);

    let delivery = pipeline.deliver(&canvas).await.unwrap();
    assert_eq!(delivery.packed_len, 120 * 40 * 2 / 8);
    assert_eq!(delivery.report.parts, 50);
    assert_eq!(publisher.len(), 50);

    let blob = reassemble(&publisher);
    assert_eq!(blob.len(), delivery.blob_len);
    assert_eq!(pipeline.decode_canvas(&blob).unwrap(), canvas);
}

#[tokio::test]
async fn test_records_are_ordered_on_one_topic() {
    let (transport, publisher) = memory_transport();
    let pipeline = sender(
        32,
        8,
        &PipelineConfig::default(),
        transport.with_topic("ward/2F/bed-7"),
    );
    pipeline.deliver(&badge(32, 8)).await.unwrap();

    for (i, (topic, payload)) in publisher.messages().iter().enumerate() {
        assert_eq!(topic, "ward/2F/bed-7");
        let record = ChunkRecord::from_json(payload).unwrap();
        assert_eq!(record.part, i as u32 + 1);
        assert_eq!(record.total_parts, 50);
        assert_eq!(record.transmission, None);
    }
}

#[tokio::test]
async fn test_white_strip_packs_to_ff() {
    let (transport, publisher) = memory_transport();
    let config = PipelineConfig {
        pack_bits: Some(1),
        ..PipelineConfig::default()
    };
    let pipeline = sender(8, 1, &config, transport);
    pipeline.deliver(&Canvas::filled(8, 1, Rgb::WHITE)).await.unwrap();

    let packed = pipeline.decode(&reassemble(&publisher)).unwrap();
    assert_eq!(packed.data, vec![0xFF]);
}

#[tokio::test]
async fn test_size_capped_chunks_with_ids() {
    let (transport, publisher) = memory_transport();
    let transport = transport
        .with_policy(ChunkPolicy::MaxSize(16))
        .with_transmission_ids(true);
    let pipeline = sender(64, 16, &PipelineConfig::default(), transport);

    let first = pipeline.deliver(&badge(64, 16)).await.unwrap();
    let second = pipeline.deliver(&badge(64, 16)).await.unwrap();
    assert_eq!(first.report.transmission, Some(1));
    assert_eq!(second.report.transmission, Some(2));

    for (_, payload) in publisher.messages() {
        let record = ChunkRecord::from_json(&payload).unwrap();
        assert!(record.fragment().unwrap().len() <= 16);
    }
}

#[tokio::test]
async fn test_zstd_round_trip() {
    let (transport, publisher) = memory_transport();
    let config = PipelineConfig {
        codec: Codec::Zstd,
        level: 19,
        ..PipelineConfig::default()
    };
    let pipeline = sender(48, 12, &config, transport);
    let canvas = badge(48, 12);
    pipeline.deliver(&canvas).await.unwrap();

    assert_eq!(
        pipeline.decode_canvas(&reassemble(&publisher)).unwrap(),
        canvas
    );
}

// ── Error scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_size_canvas_sends_nothing() {
    let (transport, publisher) = memory_transport();
    let pipeline = sender(32, 8, &PipelineConfig::default(), transport);

    let err = pipeline.deliver(&Canvas::filled(32, 9, Rgb::WHITE)).await.unwrap_err();
    assert!(matches!(
        err,
        EpinkError::DimensionMismatch {
            expected: (32, 8),
            actual: (32, 9)
        }
    ));
    assert!(publisher.is_empty());
}

#[tokio::test]
async fn test_missing_chunk_blocks_assembly() {
    let (transport, publisher) = memory_transport();
    let pipeline = sender(32, 8, &PipelineConfig::default(), transport);
    pipeline.deliver(&badge(32, 8)).await.unwrap();

    let mut assembler = ChunkAssembler::new();
    for (_, payload) in publisher.messages().into_iter().skip(1) {
        assembler.accept(&ChunkRecord::from_json(&payload).unwrap()).unwrap();
    }
    assert_eq!(assembler.missing(), vec![1]);
    assert!(matches!(
        assembler.assemble(),
        Err(EpinkError::IncompleteTransmission { missing: 1, total: 50 })
    ));
}

#[tokio::test]
async fn test_receiver_with_wrong_key_rejects() {
    let (transport, publisher) = memory_transport();
    let pipeline = sender(32, 8, &PipelineConfig::default(), transport);
    pipeline.deliver(&badge(32, 8)).await.unwrap();

    let (other_transport, _) = memory_transport();
    let receiver = Pipeline::new(
        PixelFormat::three_color(32, 8).unwrap(),
        &PipelineConfig::default(),
        AesGcmEnvelope::from_passphrase("not the key"),
        other_transport,
    )
    .unwrap();
    assert!(matches!(
        receiver.decode(&reassemble(&publisher)),
        Err(EpinkError::Envelope(_))
    ));
}
