pub mod decode;
pub mod flow;
pub mod reconstruct;
pub mod report;

pub use decode::decode;
pub use flow::{Addr, Key, Record, Transport};
pub use reconstruct::{Reconstructor, Summary};
pub use report::{analyze_batch, analyze_one, csv, Row};

#[cfg(test)]
mod test;
