//! Segment export
//!
//! - NumPy `.npy` encoding (float32 / float16)
//! - Container assembly (stacked or one array per segment)
//! - Self-describing segment index rows and the shared CSV index

mod assembler;
mod index;
mod npy;

pub use assembler::{CastArray, ExportAssembler, ExportBundle, ExportContainer, ExportTarget};
pub use index::{SegmentIndex, SegmentIndexRecord, INDEX_COLUMNS};
pub use npy::{load_npy, load_npy_f32, read_npy, write_npy, write_npy_to, NpyArray, NpyElement};
