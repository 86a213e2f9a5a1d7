//! Lua scripts for the viewer counter.
//!
//! Each script runs atomically inside Redis, so concurrent presence events
//! from any number of controller instances never lose an update and never
//! expose a negative count.
//!
//! Return conventions shared by both scripts:
//! - `>= 0`: the new count
//! - `-1`: counter unset (no session has reset it), nothing written
//! - `-2`: stored value is not an integer, nothing written

/// Increment the counter if it has been initialized.
///
/// A negative value left by another writer is treated as zero, so the
/// result is always `max(current, 0) + 1`.
///
/// Arguments:
/// - KEYS[1]: Counter key
pub const GUARDED_INCREMENT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == nil or current == false then
    return -1
end

local value = tonumber(current)
if value == nil then
    return -2
end

if value < 0 then
    redis.call('SET', KEYS[1], 1)
    return 1
end

return redis.call('INCR', KEYS[1])
"#;

/// Decrement the counter, clamping at zero.
///
/// Arguments:
/// - KEYS[1]: Counter key
pub const CLAMPED_DECREMENT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == nil or current == false then
    return -1
end

local value = tonumber(current)
if value == nil then
    return -2
end

if value <= 0 then
    -- Already at the floor; repair any negative value left by other writers
    redis.call('SET', KEYS[1], 0)
    return 0
end

return redis.call('DECR', KEYS[1])
"#;
