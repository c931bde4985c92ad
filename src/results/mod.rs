//! Statement results: exec outcomes, rows and the row cursor handed to query handlers.

mod exec;
mod result_set;
mod row;
mod rows;

pub use exec::ExecResult;
pub use result_set::ResultSet;
pub use row::{ColumnIndex, Row};
pub use rows::Rows;
