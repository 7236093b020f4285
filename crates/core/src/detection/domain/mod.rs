pub mod detector;
pub mod player;
pub mod player_assembler;
