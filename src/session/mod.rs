//! Session routing

mod router;

pub use router::SessionRouter;
