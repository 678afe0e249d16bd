mod format;
mod io;

pub use format::{FormatOutcome, format_records, synthesize_test_id};
pub use io::{
    LoadedDataset, fingerprint, load_dataset, parse_dataset, render_dataset, summarize,
    write_dataset,
};
