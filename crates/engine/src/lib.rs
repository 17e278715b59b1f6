pub mod cell;
pub mod sheet;
pub mod workbook;
