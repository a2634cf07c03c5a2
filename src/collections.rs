mod map;

pub use map::*;
