pub mod configure;
pub mod generate;
pub mod process;
pub mod serve;
