mod command;
mod runner;
mod util;

pub use command::{Command, Report};
pub use runner::run;
pub use util::{parse_projection_arg, parse_sort_arg, write_line};
