pub mod detect_players_use_case;
pub mod frame_sink;
pub mod pipeline_logger;
pub mod pipeline_run;
