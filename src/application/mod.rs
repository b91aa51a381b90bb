// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or evaluating the generator).
//
// Rules for this layer:
//   - No network or loss code here (that's Layer 5)
//   - No argument parsing or summary printing (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// The evaluation workflow
pub mod eval_use_case;
