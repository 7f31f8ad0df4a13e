pub mod projection_helper;

pub mod filter_list;
pub mod merge_list;
pub mod concat_list;
