mod result_set;
mod row;
mod shaping;

pub use result_set::ResultSet;
pub use row::CustomDbRow;
pub use shaping::{QueryOutput, shape_rows};
