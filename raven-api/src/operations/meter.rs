//! Meter inventory and meter settings

use crate::command::{flag, Arguments, HexId};
use crate::responses::{MeterInfo, MeterList};

define_query! {
    #[derive(Default)]
    query: GetMeterList,
    name: "get_meter_list",
    request: {},
    arguments: |_request| Ok(Arguments::new()),
    response: MeterList,
}

define_query! {
    #[derive(Default)]
    query: GetMeterInfo,
    name: "get_meter_info",
    request: {
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new().meter(request.meter.as_ref())),
    response: MeterInfo,
}

define_command! {
    /// Update the stored details of a meter; unset fields are left alone
    #[derive(Default)]
    command: SetMeterInfo,
    name: "set_meter_info",
    request: {
        meter: Option<HexId>,
        nick_name: Option<String>,
        account: Option<String>,
        auth: Option<String>,
        host: Option<String>,
        enabled: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .with_optional("NickName", request.nick_name.clone())
        .with_optional("Account", request.account.clone())
        .with_optional("Auth", request.auth.clone())
        .with_optional("Host", request.host.clone())
        .with_optional("Enabled", request.enabled.map(flag))),
}
