//! Session configuration derived from the command catalogue

use std::collections::BTreeSet;

use raven_stream::{SessionConfig, UnmatchedReplyPolicy};

use crate::command::{RavenCommand, RavenQuery};
use crate::operations::*;

/// Roots that may answer a catalogue query
pub const REPLY_ROOTS: [&str; 13] = [
    GetCurrentPeriodUsage::REPLY_ROOT,
    GetCurrentPrice::REPLY_ROOT,
    GetCurrentSummationDelivered::REPLY_ROOT,
    GetDeviceInfo::REPLY_ROOT,
    GetInstantaneousDemand::REPLY_ROOT,
    GetLastPeriodUsage::REPLY_ROOT,
    GetMessage::REPLY_ROOT,
    GetMeterInfo::REPLY_ROOT,
    GetMeterList::REPLY_ROOT,
    GetNetworkInfo::REPLY_ROOT,
    GetProfileData::REPLY_ROOT,
    GetSchedule::REPLY_ROOT,
    GetTime::REPLY_ROOT,
];

/// Every command name the catalogue can send
pub const COMMAND_NAMES: [&str; 23] = [
    CloseCurrentPeriod::NAME,
    ConfirmMessage::NAME,
    FactoryReset::NAME,
    GetCurrentPeriodUsage::NAME,
    GetCurrentPrice::NAME,
    GetCurrentSummationDelivered::NAME,
    GetDeviceInfo::NAME,
    GetInstantaneousDemand::NAME,
    GetLastPeriodUsage::NAME,
    GetMessage::NAME,
    GetMeterInfo::NAME,
    GetMeterList::NAME,
    GetNetworkInfo::NAME,
    GetProfileData::NAME,
    GetSchedule::NAME,
    GetTime::NAME,
    Initialize::NAME,
    Restart::NAME,
    SetCurrentPrice::NAME,
    SetFastPoll::NAME,
    SetMeterInfo::NAME,
    SetSchedule::NAME,
    SetScheduleDefault::NAME,
];

pub fn reply_roots() -> BTreeSet<String> {
    REPLY_ROOTS.iter().map(|root| root.to_string()).collect()
}

/// Default session settings for a RAVEn gateway.
///
/// The gateway pushes the same roots it uses for replies on its report
/// schedule, so replies nobody is waiting for are delivered as events.
pub fn session_config() -> SessionConfig {
    SessionConfig::default()
        .with_reply_roots(REPLY_ROOTS)
        .with_unmatched_reply(UnmatchedReplyPolicy::DeliverAsEvent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_entries_are_unique() {
        assert_eq!(reply_roots().len(), REPLY_ROOTS.len());
        let names: BTreeSet<_> = COMMAND_NAMES.iter().collect();
        assert_eq!(names.len(), COMMAND_NAMES.len());
    }

    #[test]
    fn test_session_config_is_valid() {
        let config = session_config();
        assert!(config.validate().is_ok());
        assert!(config.reply_roots.contains("PriceCluster"));
        assert!(!config.reply_roots.contains("ConnectionStatus"));
        assert_eq!(config.unmatched_reply, UnmatchedReplyPolicy::DeliverAsEvent);
    }
}
