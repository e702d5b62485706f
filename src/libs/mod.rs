pub mod aligner;
pub mod anchor;
pub mod block;
pub mod blockset;
pub mod bloom;
pub mod error;
pub mod expander;
pub mod fc;
pub mod filter;
pub mod fmt;
pub mod fragment;
pub mod io;
pub mod jobs;
pub mod joiner;
pub mod overlap;
pub mod pair_aligner;
pub mod processor;
pub mod row;
pub mod seq;
pub mod stick;

/// Coordinate on a sequence. Signed, so that `end_pos()` of a reverse
/// fragment starting at 0 can be expressed as -1.
pub type Pos = i64;

/// Orientation of a fragment: +1 (forward) or -1 (reverse complement).
pub type Ori = i32;
