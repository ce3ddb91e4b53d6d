//! Defaults for the benchmarked query: the top 2 authors from Serbia aged 27,
//! ranked by book count, with their books published before 1900.

pub const DEFAULT_COUNTRY: &str = "Serbia";
pub const DEFAULT_AGE: u32 = 27;
pub const DEFAULT_YEAR_CUTOFF: i32 = 1900;
pub const DEFAULT_TOP_N: usize = 2;
