//! Reply and broadcast texts used by the global mute commands.

pub const NO_TARGET: &str = "You don't seem to be referring to a user.";
pub const TARGET_IS_SUDO: &str = "That user is a sudo user. Operators can't gmute each other.";
pub const TARGET_IS_SUPPORT: &str = "That user is on the support team and can't be gmuted.";
pub const TARGET_IS_SELF: &str = "I'm not going to gmute myself.";
pub const NOT_AN_OPERATOR: &str = "Only gmute operators can use this command.";
pub const TARGET_NOT_MUTED: &str = "This user is not gmuted!";

pub const ALREADY_MUTED_NO_REASON: &str =
    "This user is already gmuted. Give me a reason if you want me to change it.";
pub const ALREADY_MUTED_REASON_ADDED: &str =
    "This user is already gmuted, but had no reason set. I've added yours.";

pub const GMUTE_DONE: &str = "Person has been gmuted.";
pub const UNGMUTE_DONE: &str = "Person has been un-gmuted.";
pub const GMUTE_BROADCAST_DONE: &str = "gmute complete!";
pub const UNGMUTE_BROADCAST_DONE: &str = "un-gmute complete!";

pub const NO_REASON_GIVEN: &str = "No reason given";

pub const EMPTY_GMUTE_LIST: &str = "There aren't any gmuted users right now.";
pub const GMUTE_LIST_HEADER: &str = "Globally muted users.";
pub const GMUTE_LIST_CAPTION: &str = "Here is the list of currently gmuted users.";

pub const ENFORCED_ON_SIGHT: &str = "This is a bad person, they shouldn't be here!";

pub const GMUTESTAT_ENABLED: &str = "I've enabled gmutes in this server. Anyone who gets gmuted \
    will be muted here as well.";
pub const GMUTESTAT_DISABLED: &str = "I've disabled gmutes in this server. Global mutes won't \
    affect your members anymore, so you'll be less protected from spammers.";

/// Reply for the already-muted case when an old reason was replaced
pub fn reason_replaced(old_reason: &str) -> String {
    format!(
        "This user is already gmuted, for the following reason:\n```\n{}\n```\nI've updated it with your new reason!",
        old_reason
    )
}

pub fn gmute_failed(error: &str) -> String {
    format!("Could not gmute due to: {}", error)
}

pub fn ungmute_failed(error: &str) -> String {
    format!("Could not un-gmute due to: {}", error)
}

pub fn gmutestat_usage(current: bool) -> String {
    format!(
        "Give me an argument to choose a setting: on/off, yes/no.\n\n\
        Your current setting is: **{}**\n\
        When true, every gmute also applies in this server. \
        When false, it doesn't, leaving you at the mercy of spammers.",
        current
    )
}
