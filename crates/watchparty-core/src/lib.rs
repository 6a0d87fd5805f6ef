pub mod net;
pub mod playback;
pub mod room;
pub mod time;
