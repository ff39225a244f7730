mod global_mute;
mod gmute_setting;

pub use global_mute::GlobalMute;
pub use gmute_setting::GmuteSetting;
