#![forbid(unsafe_code)]

pub mod content;
pub mod links;
pub mod model;
pub mod slug;
