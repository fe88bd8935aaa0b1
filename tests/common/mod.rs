#![allow(dead_code)]

pub mod builders;
pub mod mocks;

pub use builders::engine::{DurableEngine, TestEngine, TestEngineBuilder};
pub use builders::metrics::{file_metric, shell_metric, write_probe_file};
pub use mocks::executor::{Stub, StubExecutor};
