//! Tag session tests against the simulated reader
//!
//! Ordering, identity patch, size validation and failure handling.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tagsmith_layout::layout::{
    CAPABILITY_CONTAINER, CONFIG0, CONFIG1, DYNAMIC_LOCK_BITS, PACK_RFUI, STATIC_LOCK_BITS,
};
use tagsmith_layout::{Command, PageAddress, TagClass, WritePassword};
use tagsmith_session::test_harness::{SimEvent, SimulatedReader, SimulatedTag};
use tagsmith_session::{
    ImageCodec, ImageSlot, ScanOutcome, SessionContext, SessionEnd, SessionError, SessionMode,
    SessionState, SnapshotPublisher, TagSession,
};
use tagsmith_test_utils::{sample_image, test_serial, RecordingCodec};

struct Rig {
    codec: Arc<RecordingCodec>,
    image: ImageSlot,
    publisher: SnapshotPublisher,
}

impl Rig {
    fn loaded() -> Self {
        let codec = Arc::new(RecordingCodec::new(0x5a));
        let image = ImageSlot::new();
        image.set_codec(codec.clone());
        image.load(codec.as_ref(), &sample_image()).unwrap();
        Self {
            codec,
            image,
            publisher: SnapshotPublisher::new(true, true),
        }
    }

    fn unloaded() -> Self {
        Self {
            codec: Arc::new(RecordingCodec::new(0x5a)),
            image: ImageSlot::new(),
            publisher: SnapshotPublisher::new(true, true),
        }
    }

    async fn run(&self, reader: &SimulatedReader) -> Result<ScanOutcome, SessionError> {
        self.run_mode(reader, SessionMode::Write).await
    }

    async fn run_mode(
        &self,
        reader: &SimulatedReader,
        mode: SessionMode,
    ) -> Result<ScanOutcome, SessionError> {
        let ctx = SessionContext {
            reader,
            image: &self.image,
            publisher: &self.publisher,
            alert_message: "Hold your device near a tag to write.",
        };
        TagSession::new(ctx, mode).run().await
    }
}

fn expected_order() -> Vec<PageAddress> {
    let mut pages: Vec<PageAddress> = (4..=128).collect();
    pages.extend_from_slice(&[133, 134, 3, 131, 132, 130, 2]);
    pages
}

fn write_commands(tag: &SimulatedTag) -> Vec<Command> {
    tag.commands()
        .iter()
        .copied()
        .filter(|c| matches!(c, Command::Write { .. }))
        .collect()
}

#[tokio::test]
async fn full_run_writes_pages_in_order() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag.clone());

    let outcome = rig.run(&reader).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Written { pages_written: 132, .. }));

    let tag = tag.lock();
    assert_eq!(tag.written_pages(), expected_order());
    // header read first, nothing read afterwards
    assert_eq!(tag.commands()[0], Command::Read { page: 0 });
    assert_eq!(tag.commands().len(), 133);
    assert_eq!(reader.invalidations(), 1);

    let snap = rig.publisher.current();
    assert_eq!(snap.last_page_written, 0);
    assert_eq!(snap.error(), None);
}

#[tokio::test]
async fn security_and_lock_payloads() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag.clone());
    rig.run(&reader).await.unwrap();

    let writes = write_commands(&tag.lock());
    let tail: Vec<_> = writes[125..]
        .iter()
        .map(|c| match c {
            Command::Write { data, .. } => *data,
            Command::Read { .. } => unreachable!(),
        })
        .collect();
    assert_eq!(
        tail,
        vec![
            WritePassword::derive(&test_serial()).as_page(),
            PACK_RFUI,
            CAPABILITY_CONTAINER,
            CONFIG0,
            CONFIG1,
            DYNAMIC_LOCK_BITS,
            STATIC_LOCK_BITS,
        ]
    );
}

#[tokio::test]
async fn uid_is_patched_before_pack() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let header = tag.lock().memory().as_bytes()[..8].to_vec();
    let reader = SimulatedReader::with_tag(tag.clone());

    rig.run(&reader).await.unwrap();

    let packed = rig.codec.packed();
    assert_eq!(packed.len(), 1);
    let before = rig.image.plain().unwrap();
    let after = &packed[0];

    assert_eq!(&after.as_bytes()[468..476], header.as_slice());
    assert_eq!(&after.as_bytes()[..468], &before.as_bytes()[..468]);
    assert_eq!(&after.as_bytes()[476..], &before.as_bytes()[476..]);

    // the loaded image itself is left alone for the next scan
    assert_eq!(before, rig.codec.unpack(&sample_image()).unwrap());
}

#[tokio::test]
async fn user_pages_come_from_the_packed_image() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag.clone());
    rig.run(&reader).await.unwrap();

    let packed = rig.codec.pack(&rig.codec.packed()[0]).unwrap();
    let memory = tag.lock().memory();
    for page in 4..=128u8 {
        assert_eq!(memory.page(page).unwrap(), packed.page(page).unwrap(), "page {page}");
    }
}

#[tokio::test]
async fn rejects_ntag213_without_writing() {
    for (size, class) in [(0x12, TagClass::Ntag213), (0x6d, TagClass::Ntag216)] {
        let rig = Rig::loaded();
        let tag = SimulatedTag::ntag215(test_serial())
            .with_size_byte(size)
            .shared();
        let reader = SimulatedReader::with_tag(tag.clone());

        let err = rig.run(&reader).await.unwrap_err();
        assert_eq!(err, SessionError::WrongTagClass(class));
        assert!(tag.lock().written_pages().is_empty());
        assert_eq!(rig.publisher.current().error, class.to_string());
        assert_eq!(reader.invalidations(), 1);
    }
}

#[tokio::test]
async fn unknown_size_byte_proceeds() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial())
        .with_size_byte(0x40)
        .shared();
    let reader = SimulatedReader::with_tag(tag.clone());

    assert!(rig.run(&reader).await.is_ok());
    assert_eq!(tag.lock().written_pages(), expected_order());
}

#[tokio::test]
async fn write_failure_halts_pipeline() {
    for (index, failing) in expected_order().into_iter().enumerate() {
        let rig = Rig::loaded();
        let tag = SimulatedTag::ntag215(test_serial())
            .failing_write_at(failing)
            .shared();
        let reader = SimulatedReader::with_tag(tag.clone());

        let err = rig.run(&reader).await.unwrap_err();
        assert!(matches!(err, SessionError::Write { page, .. } if page == failing));
        assert!(err.is_hardware());
        assert!(err.may_leave_partial_write());
        assert!(err.to_string().starts_with("Error during write: "));

        let tag = tag.lock();
        assert_eq!(tag.written_pages(), expected_order()[..index].to_vec());
        // the failed write is the last command issued
        assert_eq!(tag.commands().last().map(Command::page), Some(failing));

        let snap = rig.publisher.current();
        assert_eq!(snap.last_page_written, 0);
        assert_eq!(snap.error, err.to_string());
    }
}

#[tokio::test]
async fn progress_tracks_last_page() {
    let rig = Rig::loaded();
    let mut rx = rig.publisher.subscribe();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag);

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().last_page_written);
        }
        seen
    });

    rig.run(&reader).await.unwrap();
    drop(rig);
    let seen = observer.await.unwrap();

    // watch coalesces, so only check the values are ordered the way they were written
    assert_eq!(seen.last(), Some(&0));
    let order = expected_order();
    let mut cursor = 0;
    for page in seen.iter().filter(|p| **p != 0) {
        let pos = order[cursor..]
            .iter()
            .position(|p| p == page)
            .expect("progress went backwards");
        cursor += pos;
    }
}

#[tokio::test]
async fn connect_failure_aborts() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag.clone());
    reader.fail_next_connect("Tag connection lost");

    let err = rig.run(&reader).await.unwrap_err();
    assert_eq!(err.to_string(), "Error during connect: Tag connection lost");
    assert!(tag.lock().commands().is_empty());
    assert_eq!(rig.publisher.current().last_page_written, 0);
}

#[tokio::test]
async fn header_read_failure_aborts() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial())
        .failing_reads("Tag response error")
        .shared();
    let reader = SimulatedReader::with_tag(tag.clone());

    let err = rig.run(&reader).await.unwrap_err();
    assert_eq!(err.to_string(), "Error during read: Tag response error");
    assert!(tag.lock().written_pages().is_empty());
}

#[tokio::test]
async fn short_header_aborts() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial())
        .with_header_len(8)
        .shared();
    let reader = SimulatedReader::with_tag(tag.clone());

    let err = rig.run(&reader).await.unwrap_err();
    assert_eq!(err, SessionError::MissingUid);
    assert_eq!(rig.publisher.current().error, "Couldn't read tag UID");
    assert!(tag.lock().written_pages().is_empty());
}

#[tokio::test]
async fn missing_image_is_an_internal_error() {
    let rig = Rig::unloaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag.clone());

    let err = rig.run(&reader).await.unwrap_err();
    assert_eq!(err, SessionError::NotInitialized);
    assert!(!err.is_hardware());
    assert!(!err.may_leave_partial_write());
    assert_eq!(
        rig.publisher.current().error,
        "Internal error: amiitool not initialized"
    );
    assert!(tag.lock().written_pages().is_empty());
    assert!(rig.codec.packed().is_empty());
}

#[tokio::test]
async fn foreign_tag_is_ignored_and_polling_continues() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::new();
    reader.push_session(vec![
        SimEvent::ForeignTag("ISO15693".into()),
        SimEvent::Tag(tag.clone()),
    ]);

    let outcome = rig.run(&reader).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Written { .. }));
    assert_eq!(tag.lock().written_pages(), expected_order());
}

#[tokio::test]
async fn foreign_tag_then_timeout_keeps_message() {
    let rig = Rig::loaded();
    let reader = SimulatedReader::new();
    reader.push_session(vec![SimEvent::ForeignTag("FeliCa".into()), SimEvent::Timeout]);

    let outcome = rig.run(&reader).await.unwrap();
    assert_eq!(outcome, ScanOutcome::Ended(SessionEnd::Timeout));
    assert_eq!(rig.publisher.current().error, "Ignoring non-mifare tag");
}

#[tokio::test]
async fn benign_endings_are_silent() {
    for event in [SimEvent::Timeout, SimEvent::Cancel] {
        let rig = Rig::loaded();
        rig.publisher.page_written(17);
        let reader = SimulatedReader::new();
        reader.push_session(vec![event]);

        let outcome = rig.run(&reader).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Ended(end) if end.is_benign()));

        let snap = rig.publisher.current();
        assert_eq!(snap.error(), None);
        assert_eq!(snap.last_page_written, 17);
    }
}

#[tokio::test]
async fn reader_failure_is_reported() {
    let rig = Rig::loaded();
    let reader = SimulatedReader::new();
    reader.push_session(vec![SimEvent::Fail("System resource unavailable".into())]);

    let err = rig.run(&reader).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error during session: System resource unavailable"
    );

    let reader = SimulatedReader::new();
    reader.fail_next_begin("Feature not supported");
    assert!(matches!(
        rig.run(&reader).await,
        Err(SessionError::Session(_))
    ));
}

#[tokio::test]
async fn session_history_walks_the_graph() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag);

    let ctx = SessionContext {
        reader: &reader,
        image: &rig.image,
        publisher: &rig.publisher,
        alert_message: "hold",
    };
    let mut session = TagSession::new(ctx, SessionMode::Write);
    session.run().await.unwrap();

    let history = session.history();
    assert_eq!(
        &history[..8],
        &[
            SessionState::Idle,
            SessionState::Active,
            SessionState::Detected,
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::ValidatingSize,
            SessionState::Patching,
            SessionState::WritingUser(4),
        ]
    );
    assert_eq!(
        &history[history.len() - 2..],
        &[SessionState::Completed, SessionState::Idle]
    );
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn dump_reads_whole_tag() {
    let rig = Rig::unloaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let expected = tag.lock().memory();
    let reader = SimulatedReader::with_tag(tag.clone());

    let outcome = rig.run_mode(&reader, SessionMode::Dump).await.unwrap();
    assert_eq!(outcome, ScanOutcome::Dumped(expected));

    let reads: Vec<_> = tag.lock().commands().iter().map(Command::page).collect();
    let expected_reads: Vec<PageAddress> = (0..135).step_by(4).collect();
    assert_eq!(reads, expected_reads);
    assert!(tag.lock().written_pages().is_empty());
}

#[tokio::test]
async fn packed_image_round_trips_through_the_codec() {
    let rig = Rig::loaded();
    let tag = SimulatedTag::ntag215(test_serial()).shared();
    let reader = SimulatedReader::with_tag(tag);
    rig.run(&reader).await.unwrap();

    let patched = &rig.codec.packed()[0];
    let packed = rig.codec.pack(patched).unwrap();
    let reread = rig.codec.unpack(packed.as_bytes()).unwrap();
    assert_eq!(&reread, patched);
}
