// Request handling pipeline between the client server and the upstream.

pub mod forward;


pub use forward::{ForwardPipeline, TransactionRecord, REMAP_TEXT_KEY};
