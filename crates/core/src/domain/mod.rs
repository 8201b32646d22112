pub mod intent;
pub mod state;
