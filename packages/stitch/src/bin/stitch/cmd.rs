pub mod coverage;
pub mod export;
pub mod find_path;
pub mod find_sources;
pub mod process;
pub mod readme;
pub mod reconstruct;
pub mod search;
pub mod splice;
