/// Router Module Index
///
/// Routes are split by who may call them. Authentication is applied per module with a
/// route layer; capability checks happen inside the handlers.

/// Anonymous, read-mostly routes used by the public site.
pub mod public;

/// Routes that need a valid session but no particular capability to reach.
pub mod authenticated;

/// The dashboard API, nested under `/admin`. Every handler checks its capability.
pub mod admin;
