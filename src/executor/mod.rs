//! Execution path: plays resolved actions to a key output sink.

pub mod output_sink;
pub mod sequence_executor;

pub use output_sink::{KeyEvent, KeyOutputSink, MemorySink, SinkError, TracingSink};
pub use sequence_executor::{ExecutorError, SequenceExecutor, ShutdownPolicy};
