#![allow(warnings)]
#![allow(dead_code)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;

mod def;
mod enc;
mod mvp;
mod picman;
mod tbl;
mod util;
