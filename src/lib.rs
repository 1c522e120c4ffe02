pub mod assemble;
pub mod codec;
pub mod error;
pub mod fetch;
pub mod output;
pub mod refresh;
pub mod report;
pub mod schedule;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
