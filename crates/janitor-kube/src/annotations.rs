//! Annotation protocol between resources and the janitor

/// TTL duration string (e.g. `5m`, `7d`, `forever`). Read only.
pub const TTL: &str = "janitor/ttl";

/// Absolute expiry timestamp. Read only.
pub const EXPIRES: &str = "janitor/expires";

/// Marks that a pre-deletion notification was already sent for the
/// current TTL/expiry window. Read and written by the janitor.
pub const NOTIFIED: &str = "janitor/notified";

/// Value written to [`NOTIFIED`]
pub const NOTIFIED_VALUE: &str = "yes";
