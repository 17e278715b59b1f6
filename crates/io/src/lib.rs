// File I/O operations

pub mod convert;
pub mod xlsx;
pub mod xlsx_styles;
