//! Gateway-level commands
//!
//! - `get_device_info`, `get_network_info`, `get_time`
//! - `initialize`, `restart`, `factory_reset`

use crate::command::{Arguments, HexId};
use crate::responses::{DeviceInfo, NetworkInfo, TimeCluster};

define_query! {
    /// Firmware, hardware and identity of the gateway
    #[derive(Default)]
    query: GetDeviceInfo,
    name: "get_device_info",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
    response: DeviceInfo,
}

define_query! {
    #[derive(Default)]
    query: GetNetworkInfo,
    name: "get_network_info",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
    response: NetworkInfo,
}

define_query! {
    /// Meter clock, optionally forcing a fresh read
    #[derive(Default)]
    query: GetTime,
    name: "get_time",
    request: {
        meter: Option<HexId>,
        refresh: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .refresh(request.refresh)),
    response: TimeCluster,
}

define_command! {
    #[derive(Default)]
    command: Initialize,
    name: "initialize",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
}

define_command! {
    #[derive(Default)]
    command: Restart,
    name: "restart",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
}

define_command! {
    /// Erase network and meter configuration
    #[derive(Default)]
    command: FactoryReset,
    name: "factory_reset",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RavenCommand, RavenQuery};

    fn text<C: RavenCommand>(command: &C) -> String {
        String::from_utf8(command.encode().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn test_get_time_encoding() {
        assert_eq!(text(&GetTime::default()), "<Command><Name>get_time</Name></Command>");

        let request = GetTime {
            meter: Some(HexId::new(vec![0x01, 0x02])),
            refresh: Some(false),
        };
        assert_eq!(
            text(&request),
            "<Command><Name>get_time</Name><MeterMacId>0x0102</MeterMacId>\
             <Refresh>N</Refresh></Command>"
        );
    }

    #[test]
    fn test_reply_roots() {
        assert_eq!(GetDeviceInfo::REPLY_ROOT, "DeviceInfo");
        assert_eq!(GetNetworkInfo::REPLY_ROOT, "NetworkInfo");
        assert_eq!(GetTime::REPLY_ROOT, "TimeCluster");
    }

    #[test]
    fn test_fire_and_forget_requests() {
        let request = Restart::default().request().unwrap();
        assert_eq!(request.name(), "restart");
        assert!(!request.expects_reply());
        assert_eq!(text(&FactoryReset::default()), "<Command><Name>factory_reset</Name></Command>");
        assert_eq!(text(&Initialize::default()), "<Command><Name>initialize</Name></Command>");
    }
}
