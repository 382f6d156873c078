// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflows behind the CLI subcommands. Each one wires the
// domain types to the infrastructure layer and does no
// printing of its own (that's Layer 1).
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// One launch: config header, resume, append metrics, save
pub mod record_use_case;

// Checkpoint summary for a directory
pub mod show_use_case;
