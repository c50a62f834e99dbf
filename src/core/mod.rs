mod table;

pub use table::{DataTable, TableError};
