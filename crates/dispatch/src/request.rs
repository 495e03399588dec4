/// A dispatchable request (command or query).
///
/// Requests are **transient** values correlating 1:1 with exactly one
/// registered handler type.
///
/// Design constraints:
/// - **Send + Sync + 'static**: requests cross task boundaries and must own
///   all their data.
/// - `Response` is the typed result the single handler produces; commands
///   without a payload use `()`.
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
}

/// A request that may mutate state.
///
/// Commands represent intent ("create this tenant"); they are rejected with a
/// domain error when invalid.
pub trait Command: Request {}

/// A request that reads state and must not mutate it.
///
/// Side-effect freedom is a contract on implementors, not a type-system
/// guarantee.
pub trait Query: Request {}
