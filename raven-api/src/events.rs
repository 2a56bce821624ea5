//! Decoded unsolicited reports
//!
//! [`DeviceEvents`] wraps a raw [`EventSubscription`] and decodes each
//! fragment into a [`RavenEvent`] on the subscriber's side, so the read loop
//! never pays for decoding.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use raven_parser::{CurrencyLookup, Decoded, Fragment};
use raven_stream::{EventSubscription, SubscriptionId};
use serde::Serialize;

use crate::command::FromFields;
use crate::responses::*;

/// One report pushed by the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "report")]
pub enum RavenEvent {
    ConnectionStatus(ConnectionStatus),
    CurrentPeriodUsage(CurrentPeriodUsage),
    CurrentSummationDelivered(CurrentSummationDelivered),
    DeviceInfo(DeviceInfo),
    InstantaneousDemand(InstantaneousDemand),
    LastPeriodUsage(LastPeriodUsage),
    MessageCluster(MessageCluster),
    MeterInfo(MeterInfo),
    MeterList(MeterList),
    NetworkInfo(NetworkInfo),
    PriceCluster(PriceCluster),
    ProfileData(ProfileData),
    ScheduleInfo(ScheduleInfo),
    TimeCluster(TimeCluster),
    /// A root this crate has no type for
    Unknown {
        root: String,
        #[serde(skip)]
        fragment: Arc<Fragment>,
    },
}

fn typed<T: FromFields>(
    fragment: &Fragment,
    currencies: &dyn CurrencyLookup,
    wrap: fn(T) -> RavenEvent,
) -> Decoded<RavenEvent> {
    T::decode(fragment, currencies).map(wrap)
}

impl RavenEvent {
    pub fn decode(fragment: Arc<Fragment>, currencies: &dyn CurrencyLookup) -> Decoded<RavenEvent> {
        let f = fragment.as_ref();
        match fragment.root() {
            "ConnectionStatus" => typed(f, currencies, RavenEvent::ConnectionStatus),
            "CurrentPeriodUsage" => typed(f, currencies, RavenEvent::CurrentPeriodUsage),
            "CurrentSummationDelivered" => typed(f, currencies, RavenEvent::CurrentSummationDelivered),
            "DeviceInfo" => typed(f, currencies, RavenEvent::DeviceInfo),
            "InstantaneousDemand" => typed(f, currencies, RavenEvent::InstantaneousDemand),
            "LastPeriodUsage" => typed(f, currencies, RavenEvent::LastPeriodUsage),
            "MessageCluster" => typed(f, currencies, RavenEvent::MessageCluster),
            "MeterInfo" => typed(f, currencies, RavenEvent::MeterInfo),
            "MeterList" => typed(f, currencies, RavenEvent::MeterList),
            "NetworkInfo" => typed(f, currencies, RavenEvent::NetworkInfo),
            "PriceCluster" => typed(f, currencies, RavenEvent::PriceCluster),
            "ProfileData" => typed(f, currencies, RavenEvent::ProfileData),
            "ScheduleInfo" => typed(f, currencies, RavenEvent::ScheduleInfo),
            "TimeCluster" => typed(f, currencies, RavenEvent::TimeCluster),
            root => Decoded::clean(RavenEvent::Unknown {
                root: root.to_string(),
                fragment: Arc::clone(&fragment),
            }),
        }
    }

    /// Root element name of the report
    pub fn root(&self) -> &str {
        match self {
            RavenEvent::ConnectionStatus(_) => ConnectionStatus::ROOT,
            RavenEvent::CurrentPeriodUsage(_) => CurrentPeriodUsage::ROOT,
            RavenEvent::CurrentSummationDelivered(_) => CurrentSummationDelivered::ROOT,
            RavenEvent::DeviceInfo(_) => DeviceInfo::ROOT,
            RavenEvent::InstantaneousDemand(_) => InstantaneousDemand::ROOT,
            RavenEvent::LastPeriodUsage(_) => LastPeriodUsage::ROOT,
            RavenEvent::MessageCluster(_) => MessageCluster::ROOT,
            RavenEvent::MeterInfo(_) => MeterInfo::ROOT,
            RavenEvent::MeterList(_) => MeterList::ROOT,
            RavenEvent::NetworkInfo(_) => NetworkInfo::ROOT,
            RavenEvent::PriceCluster(_) => PriceCluster::ROOT,
            RavenEvent::ProfileData(_) => ProfileData::ROOT,
            RavenEvent::ScheduleInfo(_) => ScheduleInfo::ROOT,
            RavenEvent::TimeCluster(_) => TimeCluster::ROOT,
            RavenEvent::Unknown { root, .. } => root,
        }
    }
}

/// Stream of decoded reports
pub struct DeviceEvents {
    subscription: EventSubscription,
    currencies: Arc<dyn CurrencyLookup>,
}

impl DeviceEvents {
    pub(crate) fn new(subscription: EventSubscription, currencies: Arc<dyn CurrencyLookup>) -> Self {
        Self {
            subscription,
            currencies,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Next report, or `None` once the session is closed
    pub async fn recv(&mut self) -> Option<Decoded<RavenEvent>> {
        let fragment = self.subscription.recv().await?;
        Some(RavenEvent::decode(fragment, self.currencies.as_ref()))
    }
}

impl Stream for DeviceEvents {
    type Item = Decoded<RavenEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.subscription)
            .poll_next(cx)
            .map(|next| next.map(|fragment| RavenEvent::decode(fragment, this.currencies.as_ref())))
    }
}
