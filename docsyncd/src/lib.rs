pub mod daemon;
pub mod intent;
pub mod sink;
pub mod sync;
pub mod terminal;
pub mod view;
