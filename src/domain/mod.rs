// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing a training run's logged state.
//
// Rules for this layer:
//   - NO file I/O
//   - NO knowledge of the checkpoint format
//   - Only structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Which process am I, and am I the primary?
pub mod rank;

// Per-step scalar history (loss, learning rate, gradient norm)
pub mod metrics;

// Optional per-layer diagnostic arrays supplied at save time
pub mod layer_stats;

// Checkpoint subdirectory labels
pub mod milestone;

// Training / model config split
pub mod run_config;

// Core abstractions (traits) that callers implement
pub mod traits;
