//! Centralized limits and thresholds for the semantic analysis core.
//!
//! # Categories
//!
//! - **Fixpoint limits**: how long the driver keeps sweeping a pass
//! - **Chain limits**: bounds on alias/bound chasing inside the declaration tree
//! - **Capacity limits**: diagnostic and scope caps

// =============================================================================
// Fixpoint Limits
// =============================================================================

/// Maximum number of sweeps the driver makes over the pending nodes of a
/// single pass before it declares non-convergence.
///
/// The no-progress detector normally stops a pass much earlier; this bound only
/// matters when every sweep keeps changing some node's state without ever
/// completing it. The final permitted sweep is flagged as the "last attempt" so
/// hooks can force their error paths.
pub const MAX_RESOLVE_SWEEPS: u32 = 0x3F;

// =============================================================================
// Chain Limits
// =============================================================================

/// Maximum number of typedef targets or formal bounds followed while settling
/// an identity. A longer chain is treated as cyclic.
pub const MAX_ALIAS_CHAIN: usize = 64;

/// Maximum number of lexical levels walked while resolving a first name.
pub const MAX_ENCLOSURE_WALK: usize = 10_000;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Default number of errors after which the sink asks the driver to abort.
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Maximum nesting depth of validation scopes.
///
/// Exceeding it is reported as an internal error rather than overflowing.
pub const MAX_SCOPE_DEPTH: usize = 1_000;
