/// Data layer: core types, loading, culling and writing.
///
/// Architecture:
/// ```text
///  .csv / .txt session log
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header + typed rows → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<Record>, shared column list
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  range cull, then bounding-box cull → new Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  writer   │  Dataset + derived columns → delimited text
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
