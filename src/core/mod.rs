// Core modules implementing transport deadlines, response decoding, and error modeling.
pub mod envelope;
pub mod error;
pub mod transport;
