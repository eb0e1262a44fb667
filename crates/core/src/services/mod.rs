pub mod runner;

pub use runner::{sha256_file, AutonameRunner};
