mod growable_list;
mod segment;

pub use growable_list::*;
pub use segment::Segment;
