//! Price queries and user-set pricing

use crate::command::{hex_number, Arguments, HexId};
use crate::responses::PriceCluster;

define_query! {
    #[derive(Default)]
    query: GetCurrentPrice,
    name: "get_current_price",
    request: {
        meter: Option<HexId>,
        refresh: Option<bool>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .refresh(request.refresh)),
    response: PriceCluster,
}

define_command! {
    /// Set a fixed price of `price × 10^-trailing_digits` in the meter's
    /// currency, for meters that do not publish one
    #[derive(Default)]
    command: SetCurrentPrice,
    name: "set_current_price",
    request: {
        price: u32,
        trailing_digits: u8,
        meter: Option<HexId>,
    },
    arguments: |request| Ok(Arguments::new()
        .meter(request.meter.as_ref())
        .with("Price", hex_number(u64::from(request.price), 8))
        .with("TrailingDigits", hex_number(u64::from(request.trailing_digits), 2))),
}
