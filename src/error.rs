//! Error types for drishti

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// drishti error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffered bytes do not start with the packet marker
    #[error("Not a packet: marker mismatch")]
    NotAPacket,

    /// Packet checksum mismatch
    #[error("Checksum error: expected {expected:#06x}, got {actual:#06x}")]
    BadCrc {
        /// Checksum carried by the packet
        expected: u16,
        /// Checksum computed over the received bytes
        actual: u16,
    },

    /// Incompatible protocol major version
    #[error("Incompatible protocol version {major}.{minor}")]
    VersionMismatch {
        /// Major version found in the packet header
        major: u16,
        /// Minor version found in the packet header
        minor: u16,
    },

    /// Message body ended before a declared field
    #[error("Message truncated: needed {needed} bytes, had {available}")]
    Truncated {
        /// Bytes required to read the next field
        needed: usize,
        /// Bytes remaining in the body
        available: usize,
    },

    /// Payload exceeds what the encoding's size field can carry
    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge {
        /// Requested payload size
        size: usize,
        /// Encoding ceiling
        limit: usize,
    },

    /// Value does not fit the wire field width
    #[error("Value {value} does not fit in {bits} bits")]
    NarrowingOverflow {
        /// Offending value
        value: u64,
        /// Field width in bits
        bits: u32,
    },

    /// Update/destroy referenced an object the registry does not hold
    #[error("Unknown object {object_id} for routing id {routing_id}")]
    UnknownObject {
        /// Shape-kind routing id
        routing_id: u16,
        /// Object id named by the operation
        object_id: u32,
    },

    /// Operation referenced a resource that was never created
    #[error("Unknown resource {0}")]
    UnknownResource(u32),

    /// A resource with this id already exists
    #[error("Duplicate resource {0}")]
    DuplicateResource(u32),

    /// Resource is not in the state the operation requires
    #[error("Resource {id}: {reason}")]
    ResourceState {
        /// Resource id
        id: u32,
        /// What was expected
        reason: &'static str,
    },

    /// Element chunk lies outside the declared resource size
    #[error("Element range {offset}+{count} exceeds resource size {total}")]
    ElementRange {
        /// First element index of the chunk
        offset: u32,
        /// Element count of the chunk
        count: u32,
        /// Declared element total
        total: u32,
    },

    /// Malformed message body
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be written
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
