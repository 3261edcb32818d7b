//! Key builders for everything Herald keeps in Redis.
//!
//! Keys are returned unprefixed; the Redis client applies the configured
//! prefix. Both keys of a user share a `{user_id}` hash tag so a script
//! touching them lands on one cluster slot. Scripts only ever touch one
//! user's keys; batch reads pipeline single-key commands instead.

// ── Presence keys ──────────────────────────────────────────

/// SET of live connection ids for a user.
pub fn presence_connections(user_id: &str) -> String {
    format!("presence:{{{user_id}}}:conns")
}

/// HASH holding `status` and `last_seen_at` for a user.
pub fn presence_record(user_id: &str) -> String {
    format!("presence:{{{user_id}}}")
}

// ── Bus keys ───────────────────────────────────────────────

/// SET of routing patterns bound to a queue.
pub fn bus_bindings(queue: &str) -> String {
    format!("bus:bindings:{queue}")
}
