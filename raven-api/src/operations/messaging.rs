//! Utility text messages

use crate::command::{hex_number, Arguments, HexId};
use crate::responses::MessageCluster;

define_query! {
    #[derive(Default)]
    query: GetMessage,
    name: "get_message",
    request: {
        meter: Option<HexId>,
        refresh: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .refresh(request.refresh)),
    response: MessageCluster,
}

define_command! {
    /// Acknowledge a message that requires confirmation
    #[derive(Default)]
    command: ConfirmMessage,
    name: "confirm_message",
    request: {
        message_id: u32,
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new()
        .with("Id", hex_number(u64::from(request.message_id), 8))
        .meter(request.meter.as_ref())),
}
