use super::*;
use bytes::Bytes;
use chrono::TimeZone;

fn sample_frame(seq: usize) -> Frame {
    let ts = Utc
        .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .unwrap()
        + chrono::Duration::milliseconds(seq as i64 * 100);
    Frame::with_timestamp(
        ts,
        Bytes::from(format!(r#"{{"sessionid":"A","seq":{seq}}}"#)),
        Bytes::from(format!(r#"{{"bones":[{seq}]}}"#)),
    )
}

#[test]
fn test_record_roundtrip() {
    let frame = sample_frame(3);
    let mut buf = BytesMut::new();
    let written = encode_record(&mut buf, &frame);
    assert_eq!(written, buf.len());
    assert_eq!(buf[buf.len() - 1], b'\n');

    let record = decode_record(&buf[..buf.len() - 1]).unwrap();
    assert_eq!(record.timestamp, frame.timestamp);
    assert_eq!(record.session, frame.session.as_ref());
    assert_eq!(record.bones, frame.bones.as_ref());
}

#[test]
fn test_record_has_exactly_three_fields() {
    let mut buf = BytesMut::new();
    encode_record(&mut buf, &sample_frame(0));

    let line = &buf[..buf.len() - 1];
    assert_eq!(line.iter().filter(|&&b| b == b'\t').count(), 2);
}

#[test]
fn test_timestamp_layout() {
    let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
        + chrono::Duration::milliseconds(67);
    let frame = Frame::with_timestamp(ts, Bytes::from_static(b"{}"), Bytes::from_static(b"{}"));

    let mut buf = BytesMut::new();
    encode_record(&mut buf, &frame);
    assert!(buf.starts_with(b"2025/01/02 03:04:05.067\t"));
}

#[test]
fn test_decode_rejects_missing_fields() {
    assert!(matches!(
        decode_record(b"2025/01/02 03:04:05.067\tonly-one-tab"),
        Err(CodecError::MissingField)
    ));
    assert!(matches!(
        decode_record(b"no tabs at all"),
        Err(CodecError::MissingField)
    ));
}

#[test]
fn test_decode_rejects_bad_timestamp() {
    assert!(matches!(
        decode_record(b"yesterday\t{}\t{}"),
        Err(CodecError::BadTimestamp(_))
    ));
}

#[test]
fn test_echoreplay_container_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec_2025-06-01_12-00-00_A.echoreplay");

    let mut container = open_container(&path).unwrap();
    let mut buf = BytesMut::new();
    for seq in 0..10 {
        encode_record(&mut buf, &sample_frame(seq));
    }
    container.write_chunk(&buf).unwrap();
    let file = container.finish().unwrap();
    file.sync_all().unwrap();

    let records = ReplayReader::read_records(&path).unwrap();
    assert_eq!(records.len(), 10);
    for (seq, record) in records.iter().enumerate() {
        assert_eq!(record.timestamp, sample_frame(seq).timestamp);
        assert_eq!(record.session, sample_frame(seq).session.as_ref());
        assert_eq!(record.bones, sample_frame(seq).bones.as_ref());
    }
}

#[test]
fn test_echoreplay_entry_named_after_basename() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec_2025-06-01_12-00-00_A.echoreplay");

    let mut container = open_container(&path).unwrap();
    let mut buf = BytesMut::new();
    encode_record(&mut buf, &sample_frame(0));
    container.write_chunk(&buf).unwrap();
    container.finish().unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(
        archive.by_index(0).unwrap().name(),
        "rec_2025-06-01_12-00-00_A.echoreplay"
    );
}

#[test]
fn test_nevrcap_container_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec_2025-06-01_12-00-00_A.nevrcap");

    let mut container = open_container(&path).unwrap();
    let mut buf = BytesMut::new();
    for seq in 0..5 {
        encode_record(&mut buf, &sample_frame(seq));
    }
    container.write_chunk(&buf).unwrap();
    container.finish().unwrap().sync_all().unwrap();

    let records = ReplayReader::read_records(&path).unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[4].session, sample_frame(4).session.as_ref());
}

#[test]
fn test_multiple_chunks_concatenate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.nevrcap");

    let mut container = open_container(&path).unwrap();
    for seq in 0..3 {
        let mut buf = BytesMut::new();
        encode_record(&mut buf, &sample_frame(seq));
        container.write_chunk(&buf).unwrap();
    }
    container.finish().unwrap();

    assert_eq!(ReplayReader::read_records(&path).unwrap().len(), 3);
}

#[test]
fn test_unknown_extension_rejected() {
    let err = open_container(Path::new("out/rec.mp4")).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedExtension(_)));

    let err = ReplayReader::read_records(Path::new("out/rec.mp4")).unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedExtension(_)));
}
