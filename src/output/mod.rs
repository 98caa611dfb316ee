//! Stream output routing

mod router;


pub use router::{
    OutputDescriptor, OutputRouter, OutputSettings, OutputTarget, TargetKind, regenerate,
};
