#![no_std]

pub use tschnorr;
