/// Bumped whenever the hub/agent wire vocabulary changes incompatibly.
pub const PROTOCOL_VERSION: u32 = 2;
