pub mod constants;
pub mod state;
pub mod systems;
pub mod game_loop;
pub mod match_result;
pub mod mode;
pub mod performance;
pub mod snapshot;
pub mod spatial;
pub mod input_buffer;
pub mod events;
pub mod world;
