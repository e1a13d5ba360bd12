pub mod session_reaper;
