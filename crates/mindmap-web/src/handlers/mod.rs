pub mod generate;
pub mod index;
pub mod stream;
