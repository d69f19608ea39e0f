/// Lua script for the atomic increment-with-expiry primitive
///
/// Running the increment, the first-write TTL assignment and the TTL
/// read-back as one script makes the whole operation atomic on the store
/// side, replacing a client-side WATCH/MULTI/EXEC retry loop. Two handlers
/// racing on the same key each observe a distinct count; no increment is
/// ever lost.
///
/// KEYS[1] = the counter key
/// ARGV[1] = window duration (seconds)
///
/// Returns: [count after increment, remaining ttl (seconds)]
pub const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local key = KEYS[1]
local window = tonumber(ARGV[1])

local current = redis.call('INCR', key)

-- First write of the window owns the TTL
if current == 1 then
    redis.call('EXPIRE', key, window)
end

local ttl = redis.call('TTL', key)
if ttl < 0 then
    -- Key survived a flush or external write without expiry; reattach it
    redis.call('EXPIRE', key, window)
    ttl = window
end

return {current, ttl}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_valid() {
        assert!(INCR_WITH_EXPIRY_SCRIPT.contains("INCR"));
        assert!(INCR_WITH_EXPIRY_SCRIPT.contains("EXPIRE"));
        assert!(INCR_WITH_EXPIRY_SCRIPT.contains("TTL"));
    }
}
