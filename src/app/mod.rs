pub mod basic_cleaning_use_case;
pub mod ports;
