//! Track discovery.
//!
//! Track lists come from the identification mode of mkvmerge (`-J`), which
//! prints a JSON description of the container. Only audio and subtitle
//! tracks are surfaced; video and other tracks are always copied as-is.

mod mkvmerge;
mod types;

pub use mkvmerge::{parse_identify_json, probe_with_mkvmerge};
pub use types::*;
