//! Small utilities shared by every crate in the workspace: tag maps, counting collections, a
//! hierarchical phase timer, and logger setup.

#[macro_use]
extern crate log;

mod collections;
pub mod logger;
mod tags;
mod time;
mod utils;

pub use crate::collections::Counter;
pub use crate::tags::Tags;
pub use crate::time::{prettyprint_time, Timer};
pub use crate::utils::{plain_list_names, prettyprint_usize};

// Thanks https://stackoverflow.com/a/49806368
#[macro_export]
macro_rules! skip_fail {
    ($res:expr) => {
        match $res {
            Some(val) => val,
            None => {
                continue;
            }
        }
    };
}
