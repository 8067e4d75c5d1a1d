//! Generation of object identifiers and session identifiers.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use utr_model::{Binary, Document, ObjectId};
use uuid::Uuid;

static COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

/// Generates a new object identifier.
///
/// The layout is a four-byte timestamp in seconds, five bytes unique to the
/// process and a three-byte counter, so identifiers generated by one process
/// sort in creation order.
#[must_use]
pub fn new_object_id() -> ObjectId {
    let unique = PROCESS_UNIQUE.get_or_init(|| {
        let random = Uuid::new_v4();
        let mut bytes = [0_u8; 5];
        for (slot, byte) in bytes.iter_mut().zip(random.as_bytes()) {
            *slot = *byte;
        }
        bytes
    });
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let timestamp = u32::try_from(seconds).unwrap_or(u32::MAX);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    #[expect(
        clippy::big_endian_bytes,
        reason = "object identifiers store timestamp and counter big-endian"
    )]
    let (time_bytes, counter_bytes) = (timestamp.to_be_bytes(), counter.to_be_bytes());

    let mut bytes = [0_u8; 12];
    for (slot, byte) in bytes.iter_mut().zip(
        time_bytes
            .iter()
            .chain(unique.iter())
            .chain(counter_bytes.iter().skip(1)),
    ) {
        *slot = *byte;
    }
    ObjectId::from_bytes(bytes)
}

/// Generates a new logical session identifier document, `{id: <UUID>}`.
#[must_use]
pub fn new_session_id() -> Document {
    let mut lsid = Document::new();
    lsid.insert(
        "id",
        Binary::new(Binary::UUID, Uuid::new_v4().as_bytes().to_vec()),
    );
    lsid
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
