//! Consumption readings, interval data and polling control

use chrono::{DateTime, TimeZone, Utc};
use raven_parser::IntervalChannel;

use crate::command::{hex_number, Arguments, HexId};
use crate::error::{ApiError, Result};
use crate::responses::{
    CurrentPeriodUsage, CurrentSummationDelivered, InstantaneousDemand, LastPeriodUsage,
    ProfileData,
};

/// Longest fast-poll frequency the gateway accepts, in seconds
pub const MAX_FAST_POLL_FREQUENCY: u16 = 0xFF;
/// Longest fast-poll duration the gateway accepts, in minutes
pub const MAX_FAST_POLL_DURATION: u16 = 0x0F;
/// Most intervals one `get_profile_data` may request
pub const MAX_PROFILE_PERIODS: u8 = 12;

define_query! {
    #[derive(Default)]
    query: GetInstantaneousDemand,
    name: "get_instantaneous_demand",
    request: {
        meter: Option<HexId>,
        refresh: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .refresh(request.refresh)),
    response: InstantaneousDemand,
}

define_query! {
    #[derive(Default)]
    query: GetCurrentSummationDelivered,
    name: "get_current_summation_delivered",
    request: {
        meter: Option<HexId>,
        refresh: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .refresh(request.refresh)),
    response: CurrentSummationDelivered,
}

define_query! {
    #[derive(Default)]
    query: GetCurrentPeriodUsage,
    name: "get_current_period_usage",
    request: {
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new().meter(request.meter.as_ref())),
    response: CurrentPeriodUsage,
}

define_query! {
    #[derive(Default)]
    query: GetLastPeriodUsage,
    name: "get_last_period_usage",
    request: {
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new().meter(request.meter.as_ref())),
    response: LastPeriodUsage,
}

define_command! {
    /// Start a new accumulation period for `get_current_period_usage`
    #[derive(Default)]
    command: CloseCurrentPeriod,
    name: "close_current_period",
    request: {
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new().meter(request.meter.as_ref())),
}

define_query! {
    /// Interval data for `periods` intervals ending at `end_time`
    query: GetProfileData,
    name: "get_profile_data",
    request: {
        periods: u8,
        end_time: DateTime<Utc>,
        channel: IntervalChannel,
        meter: Option<HexId>,
    },
    arguments: |request| {
        if request.periods == 0 || request.periods > MAX_PROFILE_PERIODS {
            return Err(ApiError::invalid_argument(
                "NumberOfPeriods",
                format!("must be between 1 and {MAX_PROFILE_PERIODS}"),
            ));
        }
        Ok(Arguments::new()
            .with("NumberOfPeriods", hex_number(u64::from(request.periods), 2))
            .with("EndTime", hex_number(gateway_seconds(request.end_time)?, 8))
            .with("IntervalChannel", request.channel.as_str())
            .meter(request.meter.as_ref()))
    },
    response: ProfileData,
}

define_command! {
    /// Poll the meter every `frequency` seconds for `duration` minutes
    command: SetFastPoll,
    name: "set_fast_poll",
    request: {
        frequency: u16,
        duration: u16,
        meter: Option<HexId>,
    },
    arguments: |request| {
        if request.frequency == 0 || request.frequency > MAX_FAST_POLL_FREQUENCY {
            return Err(ApiError::invalid_argument(
                "Frequency",
                format!("must be between 1 and {MAX_FAST_POLL_FREQUENCY} seconds"),
            ));
        }
        if request.duration > MAX_FAST_POLL_DURATION {
            return Err(ApiError::invalid_argument(
                "Duration",
                format!("must be at most {MAX_FAST_POLL_DURATION} minutes"),
            ));
        }
        Ok(Arguments::new()
            .with("Frequency", hex_number(u64::from(request.frequency), 4))
            .with("Duration", hex_number(u64::from(request.duration), 4))
            .meter(request.meter.as_ref()))
    },
}

/// Seconds since the gateway epoch, 2000-01-01T00:00:00Z
fn gateway_seconds(time: DateTime<Utc>) -> Result<u64> {
    let epoch = Utc
        .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ApiError::invalid_argument("EndTime", "epoch out of range"))?;
    let seconds = (time - epoch).num_seconds();
    u32::try_from(seconds)
        .map(u64::from)
        .map_err(|_| ApiError::invalid_argument("EndTime", format!("{time} is outside the gateway clock range")))
}
