//! Job definitions.

#![allow(missing_docs)]

mod deliver;

pub use deliver::DeliveryJob;
