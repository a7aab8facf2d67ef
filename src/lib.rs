//! Terminal browser for a hosted table of archaeological research permits.
//!
//! The table is fetched in bounded chunks, searched and filtered in memory,
//! shown page by page and exported to CSV.

pub mod controller;
pub mod domain;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod inputter;
pub mod model;
pub mod normalize;
pub mod pagination;
pub mod record;
pub mod source;
pub mod status;
pub mod ui;
