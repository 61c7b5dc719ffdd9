pub mod countdown;
pub mod protocol;
pub mod quiz;
pub mod relay;
pub mod scoring;
pub mod session;
pub mod setup;
