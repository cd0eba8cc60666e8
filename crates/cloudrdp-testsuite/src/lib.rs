// No need to be as strict as in production libraries
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::cast_possible_truncation)]

// Referenced by the expanded test macros.
use cloudrdp_core as _;

#[macro_use]
mod macros;

#[doc(hidden)]
pub use paste::paste;
