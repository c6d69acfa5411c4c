pub mod gridvalue;
pub mod health;
pub mod static_files;
