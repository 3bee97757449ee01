//! In-process paper broker.
//!
//! Serves the configured catalog and snapshots, accepts every valid
//! order with a sequential `P000001`-style number, and queues the
//! acknowledgment / fill events a real session would later deliver.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use touch_core::{
    ClientOrderId, ContractMeta, OrderEvent, OrderEventKind, OrderReceipt, OrderSpec, Snapshot,
};
use touch_engine::{Broker, BrokerError, BrokerResult, QuoteChannel};
use tracing::{debug, info};

use crate::config::PaperConfig;

/// An order the paper broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperOrder {
    pub seqno: String,
    pub cloid: ClientOrderId,
    pub code: String,
    pub order: OrderSpec,
}

pub struct PaperBroker {
    config: PaperConfig,
    catalog: HashMap<String, ContractMeta>,
    snapshots: HashMap<String, Snapshot>,
    next_seqno: AtomicU64,
    orders: Mutex<Vec<PaperOrder>>,
    subscriptions: Mutex<HashSet<(String, QuoteChannel)>>,
    outbox: Mutex<VecDeque<OrderEvent>>,
}

impl PaperBroker {
    pub fn new(
        config: PaperConfig,
        contracts: impl IntoIterator<Item = ContractMeta>,
        snapshots: HashMap<String, Snapshot>,
    ) -> Self {
        Self {
            config,
            catalog: contracts
                .into_iter()
                .map(|c| (c.code.clone(), c))
                .collect(),
            snapshots,
            next_seqno: AtomicU64::new(1),
            orders: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(HashSet::new()),
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Orders accepted so far, in submission order.
    pub fn orders(&self) -> Vec<PaperOrder> {
        self.orders.lock().clone()
    }

    pub fn is_subscribed(&self, code: &str, channel: QuoteChannel) -> bool {
        self.subscriptions
            .lock()
            .contains(&(code.to_string(), channel))
    }

    /// Take every queued order event.
    pub fn drain_events(&self) -> Vec<OrderEvent> {
        self.outbox.lock().drain(..).collect()
    }

    fn queue_event(
        &self,
        kind: OrderEventKind,
        seqno: &str,
        contract: &ContractMeta,
        order: &OrderSpec,
    ) {
        let event = OrderEvent::new(kind, seqno, contract.code.clone())
            .with_contract(contract.clone())
            .with_order(order.clone());
        self.outbox.lock().push_back(event);
    }
}

impl Broker for PaperBroker {
    fn lookup_contract(&self, code: &str) -> Option<ContractMeta> {
        self.catalog.get(code).cloned()
    }

    fn query_snapshot(&self, contract: &ContractMeta) -> BrokerResult<Snapshot> {
        self.snapshots
            .get(&contract.code)
            .cloned()
            .ok_or_else(|| BrokerError::Unavailable(format!("no snapshot for {}", contract.code)))
    }

    fn subscribe(&self, contract: &ContractMeta, channel: QuoteChannel) -> BrokerResult<()> {
        debug!(code = %contract.code, channel = %channel, "Paper subscribe");
        self.subscriptions
            .lock()
            .insert((contract.code.clone(), channel));
        Ok(())
    }

    fn unsubscribe(&self, contract: &ContractMeta, channel: QuoteChannel) -> BrokerResult<()> {
        debug!(code = %contract.code, channel = %channel, "Paper unsubscribe");
        self.subscriptions
            .lock()
            .remove(&(contract.code.clone(), channel));
        Ok(())
    }

    fn submit_order(
        &self,
        contract: &ContractMeta,
        order: &OrderSpec,
        cloid: &ClientOrderId,
    ) -> BrokerResult<OrderReceipt> {
        order
            .validate()
            .map_err(|e| BrokerError::Rejected(e.to_string()))?;

        let seqno = format!("P{:06}", self.next_seqno.fetch_add(1, Ordering::Relaxed));
        info!(
            seqno = %seqno,
            cloid = %cloid,
            code = %contract.code,
            order = %order,
            "Paper order accepted"
        );
        self.orders.lock().push(PaperOrder {
            seqno: seqno.clone(),
            cloid: cloid.clone(),
            code: contract.code.clone(),
            order: order.clone(),
        });

        if self.config.auto_ack {
            self.queue_event(OrderEventKind::Acknowledged, &seqno, contract, order);
        }
        if self.config.auto_fill {
            self.queue_event(OrderEventKind::Filled, &seqno, contract, order);
        }

        Ok(OrderReceipt {
            cloid: cloid.clone(),
            seqno,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use touch_core::{OrderSide, Price};

    fn broker(config: PaperConfig) -> PaperBroker {
        let contract = ContractMeta::new(
            "TXFC0",
            Price::new(dec!(10805)),
            Price::new(dec!(8841)),
            Price::new(dec!(9823)),
        );
        let mut snapshots = HashMap::new();
        snapshots.insert(
            "TXFC0".to_string(),
            Snapshot {
                close: Price::new(dec!(9900)),
                ..Snapshot::default()
            },
        );
        PaperBroker::new(config, [contract], snapshots)
    }

    #[test]
    fn test_sequential_seqnos_and_events() {
        let broker = broker(PaperConfig::default());
        let contract = broker.lookup_contract("TXFC0").unwrap();
        let order = OrderSpec::market(OrderSide::Buy, 1);

        let first = broker
            .submit_order(&contract, &order, &ClientOrderId::new())
            .unwrap();
        let second = broker
            .submit_order(&contract, &order, &ClientOrderId::new())
            .unwrap();
        assert_eq!(first.seqno, "P000001");
        assert_eq!(second.seqno, "P000002");

        let events = broker.drain_events();
        let kinds: Vec<(OrderEventKind, &str)> = events
            .iter()
            .map(|e| (e.kind, e.seqno.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (OrderEventKind::Acknowledged, "P000001"),
                (OrderEventKind::Filled, "P000001"),
                (OrderEventKind::Acknowledged, "P000002"),
                (OrderEventKind::Filled, "P000002"),
            ]
        );
        assert!(events.iter().all(|e| e.contract.is_some()));
        assert!(events.iter().all(|e| e.order.as_ref() == Some(&order)));
        assert!(broker.drain_events().is_empty());
    }

    #[test]
    fn test_no_events_when_disabled() {
        let broker = broker(PaperConfig {
            auto_ack: false,
            auto_fill: false,
        });
        let contract = broker.lookup_contract("TXFC0").unwrap();
        broker
            .submit_order(
                &contract,
                &OrderSpec::market(OrderSide::Sell, 1),
                &ClientOrderId::new(),
            )
            .unwrap();
        assert!(broker.drain_events().is_empty());
        assert_eq!(broker.orders().len(), 1);
    }

    #[test]
    fn test_invalid_order_rejected() {
        let broker = broker(PaperConfig::default());
        let contract = broker.lookup_contract("TXFC0").unwrap();
        let result = broker.submit_order(
            &contract,
            &OrderSpec::limit(OrderSide::Buy, Price::ZERO, 1),
            &ClientOrderId::new(),
        );
        assert!(matches!(result, Err(BrokerError::Rejected(_))));
        assert!(broker.orders().is_empty());
    }

    #[test]
    fn test_snapshot_and_subscriptions() {
        let broker = broker(PaperConfig::default());
        let contract = broker.lookup_contract("TXFC0").unwrap();
        assert_eq!(
            broker.query_snapshot(&contract).unwrap().close,
            Price::new(dec!(9900))
        );

        broker.subscribe(&contract, QuoteChannel::Tick).unwrap();
        assert!(broker.is_subscribed("TXFC0", QuoteChannel::Tick));
        broker.unsubscribe(&contract, QuoteChannel::Tick).unwrap();
        assert!(!broker.is_subscribed("TXFC0", QuoteChannel::Tick));

        let missing = ContractMeta::new("TXFD0", Price::ZERO, Price::ZERO, Price::ZERO);
        assert!(broker.query_snapshot(&missing).is_err());
        assert!(broker.lookup_contract("TXFD0").is_none());
    }
}
