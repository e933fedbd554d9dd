/// Size of the fixed `sender` field, NUL terminator included.
pub const NICK_LEN: usize = 128;

/// Size of the fixed `info` field, NUL terminator included.
pub const INFO_LEN: usize = 512;

/// Longest channel name accepted by the server, in bytes.
pub const CHANNEL_NAME_MAX: usize = 31;

/// Encoded header size: `payload_len` + `sender` + `kind` + `info`.
pub const HEADER_LEN: usize = 4 + NICK_LEN + 4 + INFO_LEN;

/// Hard cap on the payload carried by a single frame (64 KiB).
///
/// Codecs may be configured with a lower limit but never a higher one.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Nickname used as `sender` on frames the server originates.
pub const SERVER_SENDER: &str = "Server";

/// Default TCP port for the server and client.
pub const DEFAULT_PORT: u16 = 8080;
