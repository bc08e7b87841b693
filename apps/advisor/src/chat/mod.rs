pub mod accumulator;
pub mod events;
pub mod handlers;
pub mod messages;
pub mod params;
pub mod prompts;
