pub mod controls;
pub mod dashboard;
pub mod datatable;
pub mod detail;
pub mod text_input;
