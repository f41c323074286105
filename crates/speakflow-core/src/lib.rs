pub mod annotator;
pub mod config;
pub mod feedback;
pub mod guide;
pub mod handler;
pub mod responder;
pub mod scoring;
pub mod translation;
pub mod tutor;

pub use config::*;
pub use handler::*;
pub use responder::*;
pub use translation::*;
pub use tutor::*;
