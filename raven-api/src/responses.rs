//! Typed reports and replies
//!
//! Every field is optional: gateways omit fields freely and a field that
//! fails to decode is reported in [`Decoded::errors`](raven_parser::Decoded)
//! instead of failing the whole report.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use raven_parser::{
    ConnectionState, CurrencyLookup, DataStatus, DateCode, FieldDecoder, IntervalPeriod,
    MessageQueue, MeterType, Price, Reading, ScheduledEvent,
};
use serde::{Deserialize, Serialize};

use crate::command::{FromFields, HexId};

fn hex_id(fields: &mut FieldDecoder<'_>, field: &str) -> Option<HexId> {
    fields.hex_bytes(field).map(HexId::from)
}

/// Diagnostic information about the meter connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub device_mac_id: Option<HexId>,
    pub coord_mac_id: Option<HexId>,
    pub status: Option<ConnectionState>,
    pub description: Option<String>,
    pub status_code: Option<HexId>,
    pub ext_pan_id: Option<HexId>,
    pub channel: Option<u64>,
    pub short_addr: Option<HexId>,
    pub link_strength: Option<u64>,
}

impl FromFields for ConnectionStatus {
    const ROOT: &'static str = "ConnectionStatus";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            coord_mac_id: hex_id(fields, "CoordMacId"),
            status: fields.parsed("Status"),
            description: fields.text("Description"),
            status_code: hex_id(fields, "StatusCode"),
            ext_pan_id: hex_id(fields, "ExtPanId"),
            channel: fields.integer("Channel"),
            short_addr: hex_id(fields, "ShortAddr"),
            link_strength: fields.integer("LinkStrength"),
        }
    }
}

/// Network the gateway is joined to; same fields as [`ConnectionStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(flatten)]
    pub connection: ConnectionStatus,
}

impl FromFields for NetworkInfo {
    const ROOT: &'static str = "NetworkInfo";

    fn from_fields(fields: &mut FieldDecoder<'_>, currencies: &dyn CurrencyLookup) -> Self {
        Self {
            connection: ConnectionStatus::from_fields(fields, currencies),
        }
    }
}

/// Consumption for the current accumulation period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPeriodUsage {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub current_usage: Option<Reading>,
    pub start_date: Option<DateTime<Utc>>,
}

impl FromFields for CurrentPeriodUsage {
    const ROOT: &'static str = "CurrentPeriodUsage";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            time_stamp: fields.utc_timestamp("TimeStamp"),
            current_usage: fields.reading("CurrentUsage"),
            start_date: fields.utc_timestamp("StartDate"),
        }
    }
}

/// Consumption for the previous accumulation period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPeriodUsage {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub last_usage: Option<Reading>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl FromFields for LastPeriodUsage {
    const ROOT: &'static str = "LastPeriodUsage";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            last_usage: fields.reading("LastUsage"),
            start_date: fields.utc_timestamp("StartDate"),
            end_date: fields.utc_timestamp("EndDate"),
        }
    }
}

/// Meter totals to date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSummationDelivered {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub summation_delivered: Option<Reading>,
    pub summation_received: Option<Reading>,
}

impl FromFields for CurrentSummationDelivered {
    const ROOT: &'static str = "CurrentSummationDelivered";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            time_stamp: fields.utc_timestamp("TimeStamp"),
            summation_delivered: fields.reading("SummationDelivered"),
            summation_received: fields.reading("SummationReceived"),
        }
    }
}

/// Current consumption rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantaneousDemand {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub demand: Option<Reading>,
}

impl FromFields for InstantaneousDemand {
    const ROOT: &'static str = "InstantaneousDemand";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            time_stamp: fields.utc_timestamp("TimeStamp"),
            demand: fields.reading("Demand"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_mac_id: Option<HexId>,
    pub install_code: Option<HexId>,
    pub link_key: Option<HexId>,
    pub fw_version: Option<String>,
    pub hw_version: Option<String>,
    pub image_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model_id: Option<String>,
    pub date_code: Option<DateCode>,
}

impl FromFields for DeviceInfo {
    const ROOT: &'static str = "DeviceInfo";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            install_code: hex_id(fields, "InstallCode"),
            link_key: hex_id(fields, "LinkKey"),
            fw_version: fields.text("FWVersion"),
            hw_version: fields.text("HWVersion"),
            image_type: fields.text("ImageType"),
            manufacturer: fields.text("Manufacturer"),
            model_id: fields.text("ModelId"),
            date_code: fields.date_code("DateCode"),
        }
    }
}

/// Text message from the utility
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCluster {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub message_id: Option<HexId>,
    pub text: Option<String>,
    pub confirmation_required: Option<bool>,
    pub confirmed: Option<bool>,
    pub queue: Option<MessageQueue>,
}

impl FromFields for MessageCluster {
    const ROOT: &'static str = "MessageCluster";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            time_stamp: fields.utc_timestamp("TimeStamp"),
            message_id: hex_id(fields, "Id"),
            text: fields.text("Text"),
            confirmation_required: fields.boolean("ConfirmationRequired"),
            confirmed: fields.boolean("Confirmed"),
            queue: fields.parsed("Queue"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterInfo {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub meter_type: Option<MeterType>,
    pub nick_name: Option<String>,
    pub account: Option<String>,
    pub auth: Option<String>,
    pub host: Option<String>,
    pub enabled: Option<bool>,
}

impl FromFields for MeterInfo {
    const ROOT: &'static str = "MeterInfo";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            meter_type: fields.parsed("MeterType"),
            nick_name: fields.text("NickName"),
            account: fields.text("Account"),
            auth: fields.text("Auth"),
            host: fields.text("Host"),
            enabled: fields.boolean("Enabled"),
        }
    }
}

/// Meters the gateway is connected to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterList {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_ids: Vec<HexId>,
}

impl FromFields for MeterList {
    const ROOT: &'static str = "MeterList";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_ids: fields
                .hex_bytes_all("MeterMacId")
                .into_iter()
                .map(HexId::from)
                .collect(),
        }
    }
}

/// Price currently in effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCluster {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub time_stamp: Option<DateTime<Utc>>,
    pub price: Option<Price>,
    pub tier: Option<u64>,
    pub tier_label: Option<String>,
    pub rate_label: Option<String>,
}

impl FromFields for PriceCluster {
    const ROOT: &'static str = "PriceCluster";

    fn from_fields(fields: &mut FieldDecoder<'_>, currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            time_stamp: fields.utc_timestamp("TimeStamp"),
            price: fields.price("Price", "TrailingDigits", "Currency", currencies),
            tier: fields.integer("Tier"),
            tier_label: fields.text("TierLabel"),
            rate_label: fields.text("RateLabel"),
        }
    }
}

/// Header of an interval data reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<DataStatus>,
    pub profile_interval_period: Option<IntervalPeriod>,
}

impl FromFields for ProfileData {
    const ROOT: &'static str = "ProfileData";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            end_time: fields.utc_timestamp("EndTime"),
            status: fields.coded("Status", DataStatus::from_code),
            profile_interval_period: fields.coded("ProfileIntervalPeriod", IntervalPeriod::from_code),
        }
    }
}

/// Schedule of one periodic report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub event: Option<ScheduledEvent>,
    pub frequency: Option<Duration>,
    pub enabled: Option<bool>,
}

impl FromFields for ScheduleInfo {
    const ROOT: &'static str = "ScheduleInfo";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            event: fields.parsed("Event"),
            frequency: fields.duration("Frequency"),
            enabled: fields.boolean("Enabled"),
        }
    }
}

/// Meter clock; `local_time` carries no zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCluster {
    pub device_mac_id: Option<HexId>,
    pub meter_mac_id: Option<HexId>,
    pub utc_time: Option<DateTime<Utc>>,
    pub local_time: Option<NaiveDateTime>,
}

impl FromFields for TimeCluster {
    const ROOT: &'static str = "TimeCluster";

    fn from_fields(fields: &mut FieldDecoder<'_>, _currencies: &dyn CurrencyLookup) -> Self {
        Self {
            device_mac_id: hex_id(fields, "DeviceMacId"),
            meter_mac_id: hex_id(fields, "MeterMacId"),
            utc_time: fields.utc_timestamp("UTCTime"),
            local_time: fields.timestamp("LocalTime"),
        }
    }
}
