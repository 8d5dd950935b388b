#![forbid(unsafe_code)]

mod blocks;
mod links;
mod pages;
mod search;

pub use blocks::*;
pub use links::*;
pub use pages::*;
pub use search::*;
