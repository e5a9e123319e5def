/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy: the gate middleware classifies every
/// path, and this structure keeps the handler surface aligned with those
/// categories so a protected endpoint cannot be mounted on a public path by
/// accident.
///
/// The three modules map directly to the guard's route categories.

/// Routes accessible to all users (health, session establishment, registration).
pub mod public;

/// Routes under the protected-API prefixes; the gate middleware guarantees an
/// authenticated, non-suspended principal before any handler here runs.
pub mod authenticated;

/// The administrator lifecycle endpoints (bootstrap and promotion).
pub mod admin;
