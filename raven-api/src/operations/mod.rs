//! The gateway command catalogue, grouped by concern

pub mod device;
pub mod messaging;
pub mod meter;
pub mod metering;
pub mod pricing;
pub mod schedule;

pub use device::{FactoryReset, GetDeviceInfo, GetNetworkInfo, GetTime, Initialize, Restart};
pub use messaging::{ConfirmMessage, GetMessage};
pub use meter::{GetMeterInfo, GetMeterList, SetMeterInfo};
pub use metering::{
    CloseCurrentPeriod, GetCurrentPeriodUsage, GetCurrentSummationDelivered,
    GetInstantaneousDemand, GetLastPeriodUsage, GetProfileData, SetFastPoll,
};
pub use pricing::{GetCurrentPrice, SetCurrentPrice};
pub use schedule::{GetSchedule, SetSchedule, SetScheduleDefault};
