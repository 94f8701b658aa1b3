//! Streaming inference delivery core.
//!
//! A job admitted on a channel is driven through three seams:
//!
//! - a [`ResourceProvider`](producer::ResourceProvider) opened into a lazy,
//!   finite [`UnitProducer`](producer::UnitProducer),
//! - a [`UnitProcessor`](processor::UnitProcessor) run on the shared
//!   [`WorkerPool`](pool::WorkerPool),
//! - a [`ResultChannel`](channel::ResultChannel) that receives one message
//!   per unit, strictly in production order.
//!
//! [`StreamService`](runner::StreamService) ties admission, production,
//! dispatch and terminal error reporting together for one request.

pub mod admission;
pub mod channel;
pub mod dispatcher;
pub mod ffmpeg;
pub mod pool;
pub mod processor;
pub mod producer;
pub mod runner;

pub use channel::{ChannelClosed, ResultChannel};
pub use dispatcher::{DispatchOutcome, StreamDispatcher};
pub use pool::WorkerPool;
pub use processor::{ProcessResult, ProcessingError, ProcessorRegistry, UnitProcessor};
pub use producer::{NextUnit, ResourceProvider, UnitProducer};
pub use runner::{JobOutcome, PipelineConfig, StreamService};
