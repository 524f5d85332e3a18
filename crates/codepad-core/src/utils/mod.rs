pub mod fs;

pub use fs::{checked_segment, ensure_path, list_files_recursive, normalize_entry_path, path_segments};

// Test module declaration
#[cfg(test)]
mod tests;
