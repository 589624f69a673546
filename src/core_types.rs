//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules. They provide
//! semantic meaning and enable future type evolution.

/// Product ID — opaque, client- and operator-supplied identifier.
///
/// # Constraints:
/// - **Printable**: bounded-length string, validated at the API boundary.
/// - **Stable**: never reassigned to a different product.
pub type ProductId = String;

/// User (purchaser) ID — opaque, client-supplied identifier.
pub type UserId = String;

/// Idempotency token — opaque, client-supplied, namespaced to a
/// short-lived marker in the counter store. Never used as a database key;
/// see [`ReservationId`] for that role.
pub type IdempotencyToken = String;

/// Reservation ID — server-generated, minted once per successful atomic
/// reservation. Flows into the `orders` primary key, which is what gives
/// the fulfillment worker its idempotence. Never swap this with
/// [`IdempotencyToken`]: the token is trusted-but-short-lived client
/// input, this is the durable identity of the order.
pub type ReservationId = uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type UnixMillis = i64;
