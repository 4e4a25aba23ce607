//! In-memory NTAG215 and reader
//!
//! `SimulatedTag` answers READ and WRITE like the real chip: READ returns
//! four pages and rolls over past the last page, WRITE stores one page and
//! ACKs. Failures can be injected at a given page. `SimulatedReader` replays
//! a scripted list of polling sessions.

use crate::channel::{DetectedTag, PollEvent, PollingSession, SessionEnd, TagChannel, TagReader};
use crate::error::ChannelError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tagsmith_layout::command::READ_RESPONSE_LEN;
use tagsmith_layout::layout::{page_offset, CAPABILITY_CONTAINER_PAGE, CC_SIZE_NTAG215};
use tagsmith_layout::{Command, PageAddress, TagDump, TagSerial, DUMP_SIZE, PAGE_SIZE, TOTAL_PAGES};

/// ACK nibble returned for a successful WRITE
pub const ACK: u8 = 0x0a;

/// Cascade tag mixed into BCC0
const CASCADE_TAG: u8 = 0x88;

/// A tag shared between the test and the reader
pub type SharedTag = Arc<Mutex<SimulatedTag>>;

/// Emulated NTAG memory
#[derive(Debug, Clone)]
pub struct SimulatedTag {
    serial: TagSerial,
    memory: Vec<u8>,
    commands: Vec<Command>,
    fail_write_at: Option<PageAddress>,
    fail_reads: Option<String>,
    header_len: Option<usize>,
}

impl SimulatedTag {
    /// Factory-fresh NTAG215 with `serial`
    #[must_use]
    pub fn ntag215(serial: TagSerial) -> Self {
        let uid = serial.as_bytes();
        let mut memory = vec![0u8; DUMP_SIZE];
        memory[0] = uid[0];
        memory[1] = uid[1];
        memory[2] = uid[2];
        memory[3] = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
        memory[4..8].copy_from_slice(&uid[3..7]);
        memory[8] = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
        memory[9] = 0x48;
        let cc = page_offset(CAPABILITY_CONTAINER_PAGE);
        memory[cc..cc + PAGE_SIZE].copy_from_slice(&[0xe1, 0x10, CC_SIZE_NTAG215, 0x00]);

        Self {
            serial,
            memory,
            commands: Vec::new(),
            fail_write_at: None,
            fail_reads: None,
            header_len: None,
        }
    }

    /// Override the capability-container size byte
    #[must_use]
    pub fn with_size_byte(mut self, size: u8) -> Self {
        self.memory[page_offset(CAPABILITY_CONTAINER_PAGE) + 2] = size;
        self
    }

    /// NAK the WRITE to `page`
    #[must_use]
    pub fn failing_write_at(mut self, page: PageAddress) -> Self {
        self.fail_write_at = Some(page);
        self
    }

    /// Fail every READ with `message`
    #[must_use]
    pub fn failing_reads(mut self, message: impl Into<String>) -> Self {
        self.fail_reads = Some(message.into());
        self
    }

    /// Truncate READ answers to `len` bytes
    #[must_use]
    pub fn with_header_len(mut self, len: usize) -> Self {
        self.header_len = Some(len);
        self
    }

    /// Wrap for sharing with a reader
    #[must_use]
    pub fn shared(self) -> SharedTag {
        Arc::new(Mutex::new(self))
    }

    /// Hardware serial
    #[must_use]
    pub fn serial(&self) -> TagSerial {
        self.serial
    }

    /// Every command received, in order
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Pages of every successful WRITE, in order
    #[must_use]
    pub fn written_pages(&self) -> Vec<PageAddress> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Write { page, .. } if Some(*page) != self.fail_write_at => Some(*page),
                _ => None,
            })
            .collect()
    }

    /// Current memory contents
    #[must_use]
    pub fn memory(&self) -> TagDump {
        TagDump::from_bytes(self.memory.clone()).unwrap_or_else(|_| TagDump::blank())
    }

    /// Execute one command
    ///
    /// # Errors
    /// Injected failures and out-of-range pages
    pub fn execute(&mut self, command: Command) -> Result<Vec<u8>, ChannelError> {
        self.commands.push(command);
        match command {
            Command::Read { page } => {
                if let Some(message) = &self.fail_reads {
                    return Err(ChannelError::Transport(message.clone()));
                }
                if page >= TOTAL_PAGES {
                    return Err(ChannelError::Transport(format!("NAK: page {page}")));
                }
                let mut out = Vec::with_capacity(READ_RESPONSE_LEN);
                for i in 0..READ_RESPONSE_LEN {
                    out.push(self.memory[(page_offset(page) + i) % DUMP_SIZE]);
                }
                if let Some(len) = self.header_len {
                    out.truncate(len);
                }
                Ok(out)
            }
            Command::Write { page, data } => {
                if self.fail_write_at == Some(page) {
                    return Err(ChannelError::Transport(format!("NAK: page {page}")));
                }
                if page >= TOTAL_PAGES {
                    return Err(ChannelError::Transport(format!("NAK: page {page}")));
                }
                let start = page_offset(page);
                self.memory[start..start + PAGE_SIZE].copy_from_slice(&data);
                Ok(vec![ACK])
            }
        }
    }
}

/// Something that happens during a scripted polling session
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// An NTAG enters the field
    Tag(SharedTag),
    /// A non-MIFARE tag enters the field
    ForeignTag(String),
    /// Operator cancels
    Cancel,
    /// Reader times out
    Timeout,
    /// Reader fails
    Fail(String),
}

/// Scripted reader
#[derive(Debug)]
pub struct SimulatedReader {
    available: bool,
    sessions: Mutex<VecDeque<Vec<SimEvent>>>,
    connect_failure: Mutex<Option<String>>,
    begin_failure: Mutex<Option<String>>,
    invalidations: Arc<AtomicUsize>,
}

impl SimulatedReader {
    /// Reader with no scripted sessions; polling times out immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: true,
            sessions: Mutex::new(VecDeque::new()),
            connect_failure: Mutex::new(None),
            begin_failure: Mutex::new(None),
            invalidations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Device without NFC hardware
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Reader whose next session presents `tag`
    #[must_use]
    pub fn with_tag(tag: SharedTag) -> Self {
        let reader = Self::new();
        reader.push_session(vec![SimEvent::Tag(tag)]);
        reader
    }

    /// Queue the events of the next polling session
    pub fn push_session(&self, events: Vec<SimEvent>) {
        self.sessions.lock().push_back(events);
    }

    /// Make the next connect fail
    pub fn fail_next_connect(&self, message: impl Into<String>) {
        *self.connect_failure.lock() = Some(message.into());
    }

    /// Make the next `begin` fail
    pub fn fail_next_begin(&self, message: impl Into<String>) {
        *self.begin_failure.lock() = Some(message.into());
    }

    /// Number of sessions invalidated so far
    #[must_use]
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TagReader for SimulatedReader {
    fn reading_available(&self) -> bool {
        self.available
    }

    async fn begin(&self, alert_message: &str) -> Result<Box<dyn PollingSession>, ChannelError> {
        if let Some(message) = self.begin_failure.lock().take() {
            return Err(ChannelError::Transport(message));
        }
        tracing::debug!(alert_message, "simulated polling started");
        let events = self.sessions.lock().pop_front().unwrap_or_default();
        Ok(Box::new(SimulatedSession {
            events: events.into(),
            present: None,
            connect_failure: self.connect_failure.lock().take(),
            invalidations: Arc::clone(&self.invalidations),
            invalidated: false,
        }))
    }
}

struct SimulatedSession {
    events: VecDeque<SimEvent>,
    present: Option<SharedTag>,
    connect_failure: Option<String>,
    invalidations: Arc<AtomicUsize>,
    invalidated: bool,
}

#[async_trait]
impl PollingSession for SimulatedSession {
    async fn next_event(&mut self) -> PollEvent {
        if self.invalidated {
            return PollEvent::Invalidated(SessionEnd::UserCancelled);
        }
        match self.events.pop_front() {
            Some(SimEvent::Tag(tag)) => {
                let serial = tag.lock().serial();
                self.present = Some(tag);
                PollEvent::Detected(vec![DetectedTag::Mifare { serial }])
            }
            Some(SimEvent::ForeignTag(kind)) => {
                PollEvent::Detected(vec![DetectedTag::Other { kind }])
            }
            Some(SimEvent::Cancel) => PollEvent::Invalidated(SessionEnd::UserCancelled),
            Some(SimEvent::Fail(message)) => {
                PollEvent::Invalidated(SessionEnd::Failed(ChannelError::Transport(message)))
            }
            Some(SimEvent::Timeout) | None => PollEvent::Invalidated(SessionEnd::Timeout),
        }
    }

    async fn connect(&mut self, tag: &DetectedTag) -> Result<Box<dyn TagChannel>, ChannelError> {
        if let Some(message) = self.connect_failure.take() {
            return Err(ChannelError::Transport(message));
        }
        let DetectedTag::Mifare { serial } = tag else {
            return Err(ChannelError::Transport("unsupported tag".into()));
        };
        match &self.present {
            Some(present) if present.lock().serial() == *serial => Ok(Box::new(SimulatedChannel {
                tag: Arc::clone(present),
            })),
            _ => Err(ChannelError::ConnectionLost),
        }
    }

    async fn invalidate(&mut self) {
        if !self.invalidated {
            self.invalidated = true;
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct SimulatedChannel {
    tag: SharedTag,
}

#[async_trait]
impl TagChannel for SimulatedChannel {
    fn serial(&self) -> TagSerial {
        self.tag.lock().serial()
    }

    async fn send(&mut self, command: Command) -> Result<Vec<u8>, ChannelError> {
        self.tag.lock().execute(command)
    }
}
