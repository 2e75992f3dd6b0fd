pub mod parse;

pub use parse::{parse_args, split_line};
