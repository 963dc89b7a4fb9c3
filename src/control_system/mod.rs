pub mod signal_control;
