pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, section, success, summary_row, timing, warn};
pub use progress::Spinner;
pub use table::{documents_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
