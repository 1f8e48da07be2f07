pub mod chain;
pub mod obsession;
pub mod timing;
pub mod topics;
