pub mod session_lock;
