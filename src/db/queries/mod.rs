pub mod global_mute;
pub mod gmute_setting;
