//! Constants and configuration for the prefix trie

/// Bit width of an IPv4 key.
pub const V4_BITS: u8 = 32;
/// Bit width of an IPv6 key.
pub const V6_BITS: u8 = 128;

/// IPv4 keys are left-aligned inside a u128; this is the shift that gets them there.
pub const V4_SHIFT: u32 = 96;

/// Arena slot of every family root (the length-0 boundary). Never freed.
pub const ROOT_ID: u32 = 0;

/// Longest textual prefix we bother parsing ("ffff:...:ffff/128" is 43 bytes).
pub const MAX_PREFIX_TEXT_LEN: usize = 64;
