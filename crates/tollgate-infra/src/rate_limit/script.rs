//! Server-side fixed-window script.

/// Lua run atomically by the store for one window update.
///
/// KEYS[1]: client key
/// ARGV[1]: now, epoch milliseconds
/// ARGV[2]: limit
/// ARGV[3]: window, milliseconds
///
/// Returns `{remaining, reset}` with `reset` in epoch milliseconds.
/// The stored `remains` field keeps counting down under overload; only the
/// returned value is floored at -1. Rollover is left to the key's PEXPIRE.
pub const FIXED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local window = tonumber(ARGV[3])

local reset = redis.call('HGET', key, 'reset')
if not reset then
    local remains = limit - 1
    reset = now + window
    redis.call('HSET', key, 'remains', remains, 'reset', reset)
    redis.call('PEXPIRE', key, window)
    return {remains, reset}
end

local remains = redis.call('HINCRBY', key, 'remains', -1)
if remains < -1 then
    remains = -1
end
return {remains, tonumber(reset)}
"#;
