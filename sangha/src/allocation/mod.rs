//! Frontier allocation across a team without negotiation.

mod allocator;
mod hungarian;
mod interest;
mod utility;

pub use allocator::{Allocation, Candidate, FrontierAllocator};
pub use hungarian::hungarian;
pub use interest::frontiers_of_interest;
pub use utility::{FrontierUtility, UNREACHABLE, exact_utility, optimistic_utility};
