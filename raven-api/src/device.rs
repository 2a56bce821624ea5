//! Typed facade over a [`DeviceSession`]
//!
//! ```rust,no_run
//! use raven_api::RavenDevice;
//!
//! # async fn run() -> raven_api::Result<()> {
//! let device = RavenDevice::connect_tcp("192.168.1.40:5000").await?;
//!
//! let demand = device.get_instantaneous_demand(None).await?.strict()?;
//! if let Some(reading) = demand.demand {
//!     println!("Demand: {} kW", reading.display);
//! }
//!
//! let mut events = device.events();
//! while let Some(report) = events.recv().await {
//!     println!("{}", report.value.root());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use raven_parser::{CurrencyLookup, Decoded, Fragment, IntervalChannel, IsoCurrencyTable, ScheduledEvent};
use raven_stream::{CommandRequest, DeviceSession, SessionConfig, StreamError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::catalogue;
use crate::command::{HexId, RavenCommand, RavenQuery};
use crate::error::Result;
use crate::events::DeviceEvents;
use crate::operations::*;
use crate::responses::*;

/// A connected gateway
pub struct RavenDevice {
    session: DeviceSession,
    currencies: Arc<dyn CurrencyLookup>,
}

impl RavenDevice {
    /// Open a gateway over any byte transport with the catalogue defaults
    pub async fn open<T>(transport: T) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::open_with_config(transport, catalogue::session_config()).await
    }

    /// Open with custom session settings; catalogue reply roots are added
    /// to `config.reply_roots`
    pub async fn open_with_config<T>(transport: T, mut config: SessionConfig) -> Result<Self>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        config.reply_roots.extend(catalogue::reply_roots());
        let session = DeviceSession::open(transport, config).await?;
        Ok(Self {
            session,
            currencies: Arc::new(IsoCurrencyTable::default()),
        })
    }

    /// Connect to a network-attached gateway
    pub async fn connect_tcp(address: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(address).await.map_err(StreamError::Io)?;
        stream.set_nodelay(true).map_err(StreamError::Io)?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "Connected to gateway");
        }
        Self::open(stream).await
    }

    /// Replace the currency table used to decode prices
    pub fn with_currencies(mut self, currencies: Arc<dyn CurrencyLookup>) -> Self {
        self.currencies = currencies;
        self
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Send a query and decode its reply
    pub async fn query<Q: RavenQuery>(&self, query: &Q) -> Result<Decoded<Q::Response>> {
        self.query_with_timeout(query, self.session.config().command_timeout)
            .await
    }

    pub async fn query_with_timeout<Q: RavenQuery>(
        &self,
        query: &Q,
        timeout: Duration,
    ) -> Result<Decoded<Q::Response>> {
        let request = query.query_request()?;
        let fragment = self.session.send_command(&request, timeout).await?;
        let decoded = Q::decode(&fragment, self.currencies.as_ref());
        if !decoded.is_clean() {
            debug!(command = Q::NAME, errors = decoded.errors.len(), "Reply decoded with field errors");
        }
        Ok(decoded)
    }

    /// Send a command without waiting for a reply
    pub async fn send<C: RavenCommand>(&self, command: &C) -> Result<()> {
        let request = command.request()?;
        self.session.send(&request).await?;
        Ok(())
    }

    /// Send a command outside the catalogue and return its raw reply
    pub async fn raw_query(&self, request: &CommandRequest) -> Result<Fragment> {
        Ok(self.session.query(request).await?)
    }

    /// Decoded unsolicited reports
    pub fn events(&self) -> DeviceEvents {
        DeviceEvents::new(self.session.subscribe(), Arc::clone(&self.currencies))
    }

    pub async fn close(self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }

    pub async fn get_current_period_usage(&self, meter: Option<HexId>) -> Result<Decoded<CurrentPeriodUsage>> {
        self.query(&GetCurrentPeriodUsage { meter }).await
    }

    pub async fn get_current_price(&self, meter: Option<HexId>) -> Result<Decoded<PriceCluster>> {
        self.query(&GetCurrentPrice { meter, refresh: None }).await
    }

    pub async fn get_current_summation_delivered(
        &self,
        meter: Option<HexId>,
    ) -> Result<Decoded<CurrentSummationDelivered>> {
        self.query(&GetCurrentSummationDelivered { meter, refresh: None })
            .await
    }

    pub async fn get_device_info(&self) -> Result<Decoded<DeviceInfo>> {
        self.query(&GetDeviceInfo {}).await
    }

    pub async fn get_instantaneous_demand(&self, meter: Option<HexId>) -> Result<Decoded<InstantaneousDemand>> {
        self.query(&GetInstantaneousDemand { meter, refresh: None })
            .await
    }

    pub async fn get_last_period_usage(&self, meter: Option<HexId>) -> Result<Decoded<LastPeriodUsage>> {
        self.query(&GetLastPeriodUsage { meter }).await
    }

    pub async fn get_message(&self, meter: Option<HexId>) -> Result<Decoded<MessageCluster>> {
        self.query(&GetMessage { meter, refresh: None }).await
    }

    pub async fn get_meter_info(&self, meter: Option<HexId>) -> Result<Decoded<MeterInfo>> {
        self.query(&GetMeterInfo { meter }).await
    }

    pub async fn get_meter_list(&self) -> Result<Decoded<MeterList>> {
        self.query(&GetMeterList {}).await
    }

    pub async fn get_network_info(&self) -> Result<Decoded<NetworkInfo>> {
        self.query(&GetNetworkInfo {}).await
    }

    pub async fn get_profile_data(
        &self,
        periods: u8,
        end_time: DateTime<Utc>,
        channel: IntervalChannel,
        meter: Option<HexId>,
    ) -> Result<Decoded<ProfileData>> {
        self.query(&GetProfileData {
            periods,
            end_time,
            channel,
            meter,
        })
        .await
    }

    pub async fn get_schedule(
        &self,
        event: Option<ScheduledEvent>,
        meter: Option<HexId>,
    ) -> Result<Decoded<ScheduleInfo>> {
        self.query(&GetSchedule { meter, event }).await
    }

    pub async fn get_time(&self, meter: Option<HexId>) -> Result<Decoded<TimeCluster>> {
        self.query(&GetTime { meter, refresh: None }).await
    }

    pub async fn close_current_period(&self, meter: Option<HexId>) -> Result<()> {
        self.send(&CloseCurrentPeriod { meter }).await
    }

    pub async fn confirm_message(&self, message_id: u32, meter: Option<HexId>) -> Result<()> {
        self.send(&ConfirmMessage { message_id, meter }).await
    }

    pub async fn factory_reset(&self) -> Result<()> {
        self.send(&FactoryReset {}).await
    }

    pub async fn initialize(&self) -> Result<()> {
        self.send(&Initialize {}).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.send(&Restart {}).await
    }

    pub async fn set_current_price(&self, price: u32, trailing_digits: u8, meter: Option<HexId>) -> Result<()> {
        self.send(&SetCurrentPrice {
            price,
            trailing_digits,
            meter,
        })
        .await
    }

    pub async fn set_fast_poll(&self, frequency: u16, duration: u16, meter: Option<HexId>) -> Result<()> {
        self.send(&SetFastPoll {
            frequency,
            duration,
            meter,
        })
        .await
    }

    pub async fn set_meter_info(&self, info: &SetMeterInfo) -> Result<()> {
        self.send(info).await
    }

    pub async fn set_schedule(
        &self,
        event: ScheduledEvent,
        frequency: u32,
        enabled: bool,
        meter: Option<HexId>,
    ) -> Result<()> {
        self.send(&SetSchedule {
            event,
            frequency,
            enabled,
            meter,
        })
        .await
    }

    pub async fn set_schedule_default(&self, event: Option<ScheduledEvent>, meter: Option<HexId>) -> Result<()> {
        self.send(&SetScheduleDefault { meter, event }).await
    }
}
