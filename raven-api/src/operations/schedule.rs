//! Periodic report schedules

use raven_parser::ScheduledEvent;

use crate::command::{flag, hex_number, Arguments, HexId};
use crate::responses::ScheduleInfo;

define_query! {
    #[derive(Default)]
    query: GetSchedule,
    name: "get_schedule",
    request: {
        meter: Option<HexId>,
        event: Option<ScheduledEvent>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .with_optional("Event", request.event.map(ScheduledEvent::as_str))),
    response: ScheduleInfo,
}

define_command! {
    /// Report `event` every `frequency` seconds
    command: SetSchedule,
    name: "set_schedule",
    request: {
        event: ScheduledEvent,
        frequency: u32,
        enabled: bool,
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .with("Event", request.event.as_str())
        .with("Frequency", hex_number(u64::from(request.frequency), 8))
        .with("Enabled", flag(request.enabled))),
}

define_command! {
    /// Restore the factory schedule for one event, or all when unset
    #[derive(Default)]
    command: SetScheduleDefault,
    name: "set_schedule_default",
    request: {
        meter: Option<HexId>,
        event: Option<ScheduledEvent>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .with_optional("Event", request.event.map(ScheduledEvent::as_str))),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RavenCommand;

    #[test]
    fn test_set_schedule_encoding() {
        let request = SetSchedule {
            event: ScheduledEvent::Demand,
            frequency: 10,
            enabled: true,
            meter: None,
        };
        assert_eq!(
            &request.encode().unwrap()[..],
            b"<Command><Name>set_schedule</Name><Event>demand</Event>\
              <Frequency>0x0000000A</Frequency><Enabled>Y</Enabled></Command>"
        );
    }

    #[test]
    fn test_get_schedule_for_one_event() {
        let request = GetSchedule {
            meter: None,
            event: Some(ScheduledEvent::Price),
        };
        let arguments = request.arguments().unwrap();
        assert_eq!(arguments.iter().collect::<Vec<_>>(), vec![("Event", "price")]);
        assert!(SetScheduleDefault::default().arguments().unwrap().is_empty());
    }
}
